//! Concurrent generation dispatch with per-job failure isolation
//!
//! Every job in the batch becomes one independent task: encode the
//! effective input, assemble the instruction, call the service once, and
//! fold any error into that job's outcome. The join produces a complete
//! outcome map keyed by job id; one job failing never cancels a sibling.

use std::collections::HashMap;

use futures_util::future::join_all;
use log::warn;

use crate::gemini::{GenerationService, OutputShape};
use crate::media;
use crate::models::{Job, JobOutcome};
use crate::prompts;

/// Read-only snapshot of one job, taken under the store lock before the
/// fan-out starts
#[derive(Debug, Clone)]
pub struct JobPayload {
    pub id: String,
    pub bytes: Vec<u8>,
    pub mime: String,
    pub has_annotation: bool,
}

impl JobPayload {
    pub fn from_job(job: &Job) -> Self {
        let has_annotation = job.has_annotation();
        Self {
            id: job.id.clone(),
            bytes: job.effective_input().to_vec(),
            // The annotation canvas always exports PNG.
            mime: if has_annotation {
                "image/png".to_string()
            } else {
                job.mime_type.clone()
            },
            has_annotation,
        }
    }
}

/// Runs every payload through the service concurrently and returns one
/// outcome per submitted job.
pub async fn run_batch(
    service: &dyn GenerationService,
    style_fragment: &str,
    payloads: Vec<JobPayload>,
) -> HashMap<String, JobOutcome> {
    let shape = OutputShape::default();
    let tasks = payloads.into_iter().map(|payload| {
        let shape = &shape;
        async move {
            let outcome = process_one(service, style_fragment, shape, &payload).await;
            (payload.id, outcome)
        }
    });

    join_all(tasks).await.into_iter().collect()
}

/// The per-job failure boundary: every error becomes an outcome value.
async fn process_one(
    service: &dyn GenerationService,
    style_fragment: &str,
    shape: &OutputShape,
    payload: &JobPayload,
) -> JobOutcome {
    let instruction = prompts::assemble_instruction(style_fragment, payload.has_annotation);

    let image = match media::encode_for_transport(&payload.bytes, &payload.mime) {
        Ok(image) => image,
        Err(error) => {
            warn!("[dispatch] job {} failed to encode: {}", payload.id, error);
            return JobOutcome::Failure { error };
        }
    };

    match service.generate(&image, &instruction, shape).await {
        Ok(data) => JobOutcome::Success { data },
        Err(e) => {
            warn!("[dispatch] job {} failed: {}", payload.id, e);
            JobOutcome::Failure {
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GenerateError;
    use crate::media::TransportImage;
    use crate::models::ProcessingStatus;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use std::sync::Mutex;

    /// Succeeds with fixed bytes unless the input contains the fail marker;
    /// records every instruction it sees.
    struct FakeService {
        fail_marker: Option<Vec<u8>>,
        instructions: Mutex<Vec<String>>,
    }

    impl FakeService {
        fn ok() -> Self {
            Self {
                fail_marker: None,
                instructions: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(marker: &[u8]) -> Self {
            Self {
                fail_marker: Some(marker.to_vec()),
                instructions: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerationService for FakeService {
        async fn generate(
            &self,
            image: &TransportImage,
            instruction: &str,
            _shape: &OutputShape,
        ) -> Result<Vec<u8>, GenerateError> {
            self.instructions.lock().unwrap().push(instruction.to_string());
            let raw = BASE64.decode(&image.data).unwrap();
            if let Some(marker) = &self.fail_marker {
                if raw.windows(marker.len()).any(|w| w == marker.as_slice()) {
                    return Err(GenerateError::Api {
                        status: 500,
                        message: "synthetic failure".to_string(),
                    });
                }
            }
            Ok(b"sticker".to_vec())
        }
    }

    fn payload(id: &str, bytes: &[u8], has_annotation: bool) -> JobPayload {
        JobPayload {
            id: id.to_string(),
            bytes: bytes.to_vec(),
            mime: "image/png".to_string(),
            has_annotation,
        }
    }

    #[tokio::test]
    async fn one_outcome_per_submitted_job() {
        for n in 1usize..=6 {
            let service = FakeService::ok();
            let payloads: Vec<_> = (0..n)
                .map(|i| payload(&format!("job-{}", i), b"img", false))
                .collect();
            let ids: Vec<_> = payloads.iter().map(|p| p.id.clone()).collect();

            let outcomes = run_batch(&service, "", payloads).await;
            assert_eq!(outcomes.len(), n);
            for id in ids {
                assert!(matches!(
                    outcomes.get(&id),
                    Some(JobOutcome::Success { .. })
                ));
            }
        }
    }

    #[tokio::test]
    async fn one_failure_never_touches_siblings() {
        let service = FakeService::failing_on(b"bad");
        let payloads = vec![
            payload("a", b"good-1", false),
            payload("b", b"bad", false),
            payload("c", b"good-2", false),
        ];

        let outcomes = run_batch(&service, "", payloads).await;
        assert_eq!(
            outcomes["a"],
            JobOutcome::Success {
                data: b"sticker".to_vec()
            }
        );
        match &outcomes["b"] {
            JobOutcome::Failure { error } => assert!(error.contains("synthetic failure")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(
            outcomes["c"],
            JobOutcome::Success {
                data: b"sticker".to_vec()
            }
        );
    }

    #[tokio::test]
    async fn annotation_switches_the_guidance_fragment() {
        let service = FakeService::ok();
        let payloads = vec![payload("marked", b"img", true), payload("plain", b"img", false)];

        run_batch(&service, "", payloads).await;

        let instructions = service.instructions.lock().unwrap();
        let marked = instructions
            .iter()
            .find(|i| i.contains(prompts::MANUAL_GUIDANCE));
        let plain = instructions
            .iter()
            .find(|i| i.contains(prompts::AUTO_GUIDANCE));
        assert!(marked.is_some());
        assert!(plain.is_some());
        assert!(!plain.unwrap().contains(prompts::MANUAL_GUIDANCE));
    }

    #[tokio::test]
    async fn encode_failure_is_an_isolated_outcome() {
        let service = FakeService::ok();
        let mut broken = payload("broken", b"not an image", false);
        broken.mime = "image/tiff".to_string();
        let payloads = vec![broken, payload("fine", b"img", false)];

        let outcomes = run_batch(&service, "", payloads).await;
        assert!(matches!(outcomes["broken"], JobOutcome::Failure { .. }));
        assert!(matches!(outcomes["fine"], JobOutcome::Success { .. }));
    }

    #[test]
    fn payload_snapshot_prefers_the_annotated_image() {
        let mut job = crate::models::Job {
            id: "j".into(),
            file_name: "dog.jpg".into(),
            mime_type: "image/jpeg".into(),
            original: vec![1],
            annotated: None,
            result: None,
            status: ProcessingStatus::Idle,
            error: None,
            width: 1,
            height: 1,
            created_at: String::new(),
        };

        let plain = JobPayload::from_job(&job);
        assert_eq!(plain.bytes, vec![1]);
        assert_eq!(plain.mime, "image/jpeg");
        assert!(!plain.has_annotation);

        job.annotated = Some(vec![2]);
        let marked = JobPayload::from_job(&job);
        assert_eq!(marked.bytes, vec![2]);
        assert_eq!(marked.mime, "image/png");
        assert!(marked.has_annotation);
    }
}
