//! Page orchestration.
//!
//! [`SheetPipeline`] runs one page end to end: region detection, row
//! segmentation of both columns, question mapping, token keys, recognition,
//! and the final answer sheet. A page either completes, with every question
//! ending in success or failure, or aborts before recognition when the
//! detector does not deliver exactly one region per class.

use std::sync::Arc;

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::core::{DigitClassifier, RegionDetector, SheetError};
use crate::domain::{
    AbortReason, AnswerKey, DetectedRegion, PageContext, PageOutcome, PageResult, RecognizedAnswer,
    RegionClass, TextToken,
};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::evidence::FailureCollector;
use crate::pipeline::key_generator::KeyGenerator;
use crate::pipeline::question_mapper::QuestionIndexMapper;
use crate::pipeline::recognition::{QuestionOutcome, RecognitionGrouper};
use crate::pipeline::stats::PageStats;
use crate::processors::{DigitSegmenter, LineSegmenter, TextTokenExtractor};

/// Builder for [`SheetPipeline`].
pub struct SheetPipelineBuilder {
    answer_key: AnswerKey,
    config: PipelineConfig,
    detector: Option<Arc<dyn RegionDetector>>,
    classifier: Option<Arc<dyn DigitClassifier>>,
}

impl SheetPipelineBuilder {
    /// Starts a builder for an exam with the given answer key.
    pub fn new(answer_key: AnswerKey) -> Self {
        Self {
            answer_key,
            config: PipelineConfig::default(),
            detector: None,
            classifier: None,
        }
    }

    /// Replaces the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the region detector used by [`SheetPipeline::process_page`].
    pub fn detector(mut self, detector: Arc<dyn RegionDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Sets the digit classifier.
    pub fn classifier(mut self, classifier: Arc<dyn DigitClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Validates the configuration and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or no classifier was given.
    pub fn build(self) -> Result<SheetPipeline, SheetError> {
        self.config.validate()?;
        let classifier = self
            .classifier
            .ok_or_else(|| SheetError::config_error("a digit classifier is required"))?;

        Ok(SheetPipeline {
            line_segmenter: LineSegmenter::new(self.config.line_segmenter.clone()),
            token_extractor: TextTokenExtractor::new(self.config.token_extractor.clone()),
            digit_segmenter: DigitSegmenter::new(self.config.digit_segmenter.clone()),
            collector: FailureCollector::new(self.config.evidence.clone()),
            answer_key: self.answer_key,
            config: self.config,
            detector: self.detector,
            classifier,
        })
    }
}

/// The answer-sheet recognition pipeline for one exam.
///
/// The pipeline holds no per-page state, so one instance serves any number
/// of pages, including from parallel workers.
pub struct SheetPipeline {
    answer_key: AnswerKey,
    config: PipelineConfig,
    detector: Option<Arc<dyn RegionDetector>>,
    classifier: Arc<dyn DigitClassifier>,
    line_segmenter: LineSegmenter,
    token_extractor: TextTokenExtractor,
    digit_segmenter: DigitSegmenter,
    collector: FailureCollector,
}

impl std::fmt::Debug for SheetPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetPipeline")
            .field("questions", &self.answer_key.len())
            .field("config", &self.config)
            .field("has_detector", &self.detector.is_some())
            .finish()
    }
}

impl SheetPipeline {
    /// Starts a builder.
    pub fn builder(answer_key: AnswerKey) -> SheetPipelineBuilder {
        SheetPipelineBuilder::new(answer_key)
    }

    /// The answer key of the exam.
    pub fn answer_key(&self) -> &AnswerKey {
        &self.answer_key
    }

    /// The active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes a full page scan.
    ///
    /// Detector problems and region-contract violations abort the page and
    /// are returned as [`PageOutcome::Aborted`].
    pub fn process_page(&self, page: &RgbImage, context: &PageContext) -> Result<PageOutcome, SheetError> {
        let aborted = |reason: AbortReason| -> Result<PageOutcome, SheetError> {
            warn!(page = %context.page_id, %reason, "page aborted");
            Ok(PageOutcome::Aborted {
                page_id: context.page_id.clone(),
                reason,
            })
        };

        let Some(detector) = &self.detector else {
            return aborted(AbortReason::DetectorUnavailable {
                message: "no region detector configured".to_string(),
            });
        };
        let regions = match detector.detect(page, &context.page_id) {
            Ok(regions) => regions,
            Err(e) => {
                return aborted(AbortReason::DetectorUnavailable { message: e.to_string() });
            }
        };

        let question_region = match single_region(&regions, RegionClass::QuestionNumber) {
            Ok(region) => region,
            Err(reason) => return aborted(reason),
        };
        let answer_region = match single_region(&regions, RegionClass::Answer) {
            Ok(region) => region,
            Err(reason) => return aborted(reason),
        };

        self.process_regions(question_region, answer_region, context)
            .map(PageOutcome::Completed)
    }

    /// Runs recognition on already-detected regions.
    pub fn process_regions(
        &self,
        question_region: &DetectedRegion,
        answer_region: &DetectedRegion,
        context: &PageContext,
    ) -> Result<PageResult, SheetError> {
        let mut stats = PageStats::default();

        let question_bands = self.line_segmenter.segment(&question_region.raster);
        stats.question_bands = question_bands.len();
        let mut table = QuestionIndexMapper::new(&self.answer_key).map(&question_bands);
        if self.config.align_regions_to_page {
            let dy = i64::from(question_region.bbox.y) - i64::from(answer_region.bbox.y);
            table = table.shifted(dy);
        }

        let answer_bands = self.line_segmenter.segment(&answer_region.raster);
        stats.answer_bands = answer_bands.len();
        let tokens: Vec<TextToken> = answer_bands
            .iter()
            .flat_map(|band| self.token_extractor.extract(band))
            .collect();
        stats.tokens = tokens.len();
        debug!(
            page = %context.page_id,
            question_bands = stats.question_bands,
            answer_bands = stats.answer_bands,
            tokens = stats.tokens,
            "segmented regions"
        );

        let keyed = KeyGenerator::new(context, &self.answer_key).generate(tokens, &table)?;
        stats.key_collisions = keyed.collisions();

        let grouper = RecognitionGrouper::new(
            &*self.classifier,
            &self.digit_segmenter,
            &self.config.recognition,
        );
        let report = grouper.recognize(&keyed, &self.answer_key);
        stats.unmatched_tokens = report.unmatched_keys.len();
        stats.groups = report.results.len();

        let entries = self.answer_key.entries();
        let mut answers: Vec<RecognizedAnswer> = entries.iter().map(RecognizedAnswer::pending).collect();
        let mut failures = Vec::new();

        for result in &report.results {
            stats.digits += result.digits;
            let question = result.question();
            match &result.outcome {
                QuestionOutcome::Recognized { answer, confidence } => {
                    stats.recognized += 1;
                    let slot = self
                        .answer_key
                        .resolve(&question)
                        .and_then(|entry| entries.iter().position(|e| e == entry));
                    match slot.map(|i| &mut answers[i]) {
                        Some(slot) if !slot.is_resolved() => {
                            slot.student_answer = Some(answer.clone());
                            slot.confidence = *confidence;
                        }
                        Some(_) => warn!(%question, "slot already answered, keeping the first answer"),
                        None => warn!(%question, "recognized a question the answer key does not list"),
                    }
                }
                QuestionOutcome::Failed { reason } => {
                    stats.failed += 1;
                    let rasters: Vec<&RgbImage> = result.group.members.iter().map(|m| &m.token.raster).collect();
                    failures.push(
                        self.collector
                            .collect(&context.student_id, question, *reason, &rasters)?,
                    );
                }
            }
        }

        info!(
            page = %context.page_id,
            student = %context.student_id,
            groups = stats.groups,
            recognized = stats.recognized,
            failed = stats.failed,
            unmatched = stats.unmatched_tokens,
            "page completed"
        );

        Ok(PageResult {
            page_id: context.page_id.clone(),
            student_id: context.student_id.clone(),
            subject: context.subject.clone(),
            answers,
            failures,
            unmatched_keys: report.unmatched_keys,
            stats,
        })
    }

    /// Processes a batch of pages.
    ///
    /// Batches larger than `parallel_threshold` run on the rayon pool. Each
    /// page reports its own result, in input order.
    pub fn process_pages(&self, pages: &[(RgbImage, PageContext)]) -> Vec<Result<PageOutcome, SheetError>> {
        if pages.len() > self.config.parallel_threshold {
            use rayon::prelude::*;
            pages
                .par_iter()
                .map(|(page, context)| self.process_page(page, context))
                .collect()
        } else {
            pages
                .iter()
                .map(|(page, context)| self.process_page(page, context))
                .collect()
        }
    }
}

/// Picks the only region of `class`.
fn single_region(regions: &[DetectedRegion], class: RegionClass) -> Result<&DetectedRegion, AbortReason> {
    let mut of_class = regions.iter().filter(|r| r.class == class);
    match (of_class.next(), of_class.count()) {
        (None, _) => Err(AbortReason::MissingRegion { class }),
        (Some(region), 0) => Ok(region),
        (Some(_), extra) => Err(AbortReason::RegionContractViolation {
            class,
            count: extra + 1,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DigitPrediction;
    use crate::domain::AnswerKeyEntry;
    use crate::processors::PixelRect;
    use image::{GrayImage, Rgb};

    struct FixedDetector(Vec<RegionClass>);

    impl RegionDetector for FixedDetector {
        fn detect(&self, page: &RgbImage, page_id: &str) -> Result<Vec<DetectedRegion>, SheetError> {
            self.0
                .iter()
                .map(|&class| DetectedRegion::crop_from_page(page, PixelRect::new(0, 0, 10, 10), class, page_id))
                .collect()
        }
    }

    struct FailingDetector;

    impl RegionDetector for FailingDetector {
        fn detect(&self, _page: &RgbImage, _page_id: &str) -> Result<Vec<DetectedRegion>, SheetError> {
            Err(SheetError::detection_error("connection refused"))
        }
    }

    struct SevenClassifier;

    impl DigitClassifier for SevenClassifier {
        fn classify(&self, _glyph: &GrayImage) -> Result<Vec<DigitPrediction>, SheetError> {
            Ok(vec![DigitPrediction::new("7", 0.99)])
        }
    }

    fn key() -> AnswerKey {
        AnswerKey::from_entries(vec![AnswerKeyEntry::new(1, 0, 1, 1.0)]).unwrap()
    }

    fn pipeline(detector: Option<Arc<dyn RegionDetector>>) -> SheetPipeline {
        let mut builder = SheetPipeline::builder(key()).classifier(Arc::new(SevenClassifier));
        if let Some(detector) = detector {
            builder = builder.detector(detector);
        }
        builder.build().unwrap()
    }

    fn page() -> (RgbImage, PageContext) {
        (
            RgbImage::from_pixel(40, 40, Rgb([255, 255, 255])),
            PageContext::new("p1", "math", "20231234"),
        )
    }

    fn abort_reason(outcome: PageOutcome) -> AbortReason {
        match outcome {
            PageOutcome::Aborted { reason, .. } => reason,
            PageOutcome::Completed(_) => panic!("page should abort"),
        }
    }

    #[test]
    fn test_builder_requires_classifier() {
        let err = SheetPipeline::builder(key()).build().unwrap_err();
        assert!(matches!(err, SheetError::ConfigError { .. }));
    }

    #[test]
    fn test_missing_region_aborts_page() {
        let (img, ctx) = page();
        let p = pipeline(Some(Arc::new(FixedDetector(vec![RegionClass::Answer]))));
        assert_eq!(
            abort_reason(p.process_page(&img, &ctx).unwrap()),
            AbortReason::MissingRegion {
                class: RegionClass::QuestionNumber
            }
        );
    }

    #[test]
    fn test_duplicate_region_aborts_page() {
        let (img, ctx) = page();
        let p = pipeline(Some(Arc::new(FixedDetector(vec![
            RegionClass::QuestionNumber,
            RegionClass::Answer,
            RegionClass::Answer,
        ]))));
        assert_eq!(
            abort_reason(p.process_page(&img, &ctx).unwrap()),
            AbortReason::RegionContractViolation {
                class: RegionClass::Answer,
                count: 2
            }
        );
    }

    #[test]
    fn test_detector_error_aborts_page() {
        let (img, ctx) = page();
        let reason = abort_reason(pipeline(Some(Arc::new(FailingDetector))).process_page(&img, &ctx).unwrap());
        assert!(matches!(reason, AbortReason::DetectorUnavailable { .. }));
        let reason = abort_reason(pipeline(None).process_page(&img, &ctx).unwrap());
        assert!(matches!(reason, AbortReason::DetectorUnavailable { .. }));
    }

    #[test]
    fn test_blank_regions_complete_with_pending_slots() {
        let (img, ctx) = page();
        let p = pipeline(Some(Arc::new(FixedDetector(vec![
            RegionClass::QuestionNumber,
            RegionClass::Answer,
        ]))));
        let outcome = p.process_page(&img, &ctx).unwrap();
        let result = outcome.result().unwrap();
        assert_eq!(result.answers.len(), 1);
        assert!(!result.answers[0].is_resolved());
        assert!(result.failures.is_empty());
        assert_eq!(result.stats.groups, 0);
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let p = pipeline(None);
        let pages: Vec<(RgbImage, PageContext)> = (0..6)
            .map(|i| {
                (
                    RgbImage::new(4, 4),
                    PageContext::new(format!("p{i}"), "math", "20231234"),
                )
            })
            .collect();
        let outcomes = p.process_pages(&pages);
        let ids: Vec<String> = outcomes
            .into_iter()
            .map(|o| o.unwrap().page_id().to_string())
            .collect();
        assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4", "p5"]);
    }
}
