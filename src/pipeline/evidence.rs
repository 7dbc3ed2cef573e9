//! Failure evidence for manual review.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{ProcessingStage, SheetError};
use crate::domain::{EvidenceFormat, EvidenceImage, FailureReason, FailureRecord, QuestionId};
use crate::utils::{encode_image_base64, hconcat_on_white};

/// Tuning for [`FailureCollector`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Encoding of evidence images.
    pub format: EvidenceFormat,
}

/// Builds [`FailureRecord`]s from the token rasters of failed questions.
#[derive(Debug, Clone, Default)]
pub struct FailureCollector {
    config: EvidenceConfig,
}

impl FailureCollector {
    /// Creates a collector.
    pub fn new(config: EvidenceConfig) -> Self {
        Self { config }
    }

    /// Concatenates `rasters` left to right and packs them into a record.
    pub fn collect(
        &self,
        student_id: &str,
        question: QuestionId,
        reason: FailureReason,
        rasters: &[&RgbImage],
    ) -> Result<FailureRecord, SheetError> {
        let evidence = hconcat_on_white(rasters);
        let data = encode_image_base64(&evidence, self.config.format).map_err(|e| {
            SheetError::processing_error(
                ProcessingStage::Evidence,
                format!("question {question} of {student_id}"),
                e,
            )
        })?;
        debug!(%question, %reason, bytes = data.len(), "collected failure evidence");

        Ok(FailureRecord {
            student_id: student_id.to_string(),
            question_number: question.major,
            sub_question_number: question.sub_number(),
            reason,
            evidence_image: EvidenceImage {
                format: self.config.format,
                width: evidence.width(),
                height: evidence.height(),
                data,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use image::Rgb;

    #[test]
    fn test_record_carries_slot_and_concatenated_rasters() {
        let a = RgbImage::from_pixel(10, 20, Rgb([0, 0, 0]));
        let b = RgbImage::from_pixel(6, 12, Rgb([0, 0, 0]));
        let record = FailureCollector::default()
            .collect("20231234", QuestionId::sub(3, 2), FailureReason::LowConfidence, &[&a, &b])
            .unwrap();
        assert_eq!(record.question_number, 3);
        assert_eq!(record.sub_question_number, 2);
        assert_eq!(record.reason, FailureReason::LowConfidence);
        assert_eq!((record.evidence_image.width, record.evidence_image.height), (16, 20));

        let bytes = STANDARD.decode(&record.evidence_image.data).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(12, 15), &Rgb([255, 255, 255]));
        assert_eq!(decoded.get_pixel(12, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_jpeg_evidence() {
        let a = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
        let collector = FailureCollector::new(EvidenceConfig {
            format: EvidenceFormat::Jpeg,
        });
        let record = collector
            .collect("20231234", QuestionId::major(1), FailureReason::NoDigits, &[&a])
            .unwrap();
        assert_eq!(record.sub_question_number, 0);
        let bytes = STANDARD.decode(&record.evidence_image.data).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
