//! Preload rule: stage an image on the device once per request id.

use netdev_core::resource::PreloadSpec;
use netdev_core::{NetworkDevice, PreloadPhase};
use netdev_device::InstallRequest;
use tracing::{debug, error, info};

use super::{Outcome, ReconcileEngine, SkipReason};
use crate::error::{AgentError, Result};

/// Preload modes accepted in `spec.preload.mode`.
const MODE_STAGE: &str = "stage";
const MODE_TRANSFER: &str = "transfer";

/// The last preload request this engine started.
#[derive(Debug, Clone)]
pub(super) struct PreloadAttempt {
    request_id: String,
    /// The attempt failed and a later sync may run it again.
    retry: bool,
}

impl ReconcileEngine {
    /// Evaluate the preload rule against `device`.
    ///
    /// A request id is handled at most once per trigger: the id is recorded
    /// under the operation lock before the device is touched, so concurrent
    /// triggers carrying the same id issue one transfer. Watch events never
    /// retry a failed preload; see [`ReconcileEngine::retry_preload`].
    pub async fn preload(&self, device: &NetworkDevice) -> Outcome {
        self.evaluate_preload(device, false).await
    }

    /// Evaluate the preload rule, also rerunning a request whose last attempt
    /// failed for a transient reason such as an unreachable device.
    /// Rejected requests (missing image URL, unknown mode) are not rerun
    /// until the request id changes.
    pub async fn retry_preload(&self, device: &NetworkDevice) -> Outcome {
        self.evaluate_preload(device, true).await
    }

    async fn evaluate_preload(&self, device: &NetworkDevice, retry_failed: bool) -> Outcome {
        let spec = &device.spec.preload;
        let request_id = spec.request_id.as_str();
        if request_id.is_empty() {
            return Outcome::Skipped(SkipReason::NoPreloadRequest);
        }

        let _guard = self.op_lock.acquire("preload").await;

        {
            let mut last = self.last_preload.lock();
            let handled = match last.as_ref() {
                Some(attempt) if attempt.request_id == request_id => {
                    !(retry_failed && attempt.retry)
                }
                _ => {
                    device.observed_preload_request() == Some(request_id)
                        && !(retry_failed && device.preload_phase() == Some(PreloadPhase::Failed))
                }
            };
            if handled {
                debug!(device = self.device_name(), request_id, "Preload already processed");
                return Outcome::Skipped(SkipReason::PreloadAlreadyProcessed);
            }
            *last = Some(PreloadAttempt {
                request_id: request_id.to_string(),
                retry: false,
            });
        }

        info!(
            device = self.device_name(),
            request_id,
            target_version = %spec.target_version,
            image_url = %spec.image_url,
            mode = %spec.mode,
            "Starting preload"
        );

        let observed = request_id.to_string();
        self.record_status("preload start", &move |s| {
            s.preload.observed_request_id.clone_from(&observed);
            s.preload.phase = Some(PreloadPhase::InProgress);
            s.preload.progress = 0;
            s.preload.message.clear();
        })
        .await;

        match self.stage_image(spec).await {
            Ok(()) => {
                info!(
                    device = self.device_name(),
                    request_id,
                    target_version = %spec.target_version,
                    "Preload succeeded"
                );
                let staged = spec.target_version.clone();
                self.record_status("preload success", &move |s| {
                    s.preload.phase = Some(PreloadPhase::Succeeded);
                    s.preload.progress = 100;
                    s.preload.message.clear();
                    if !staged.is_empty() {
                        s.os.preloaded_version.clone_from(&staged);
                    }
                })
                .await;
                Outcome::Preloaded
            }
            Err(e) => {
                let retry = !matches!(e, AgentError::InvalidRequest(_));
                *self.last_preload.lock() = Some(PreloadAttempt {
                    request_id: request_id.to_string(),
                    retry,
                });

                let message = e.to_string();
                error!(
                    device = self.device_name(),
                    request_id,
                    error = %message,
                    retry,
                    "Preload failed"
                );
                let reported = message.clone();
                self.record_status("preload failure", &move |s| {
                    s.preload.phase = Some(PreloadPhase::Failed);
                    s.preload.message.clone_from(&reported);
                })
                .await;
                Outcome::PreloadFailed(message)
            }
        }
    }

    async fn stage_image(&self, spec: &PreloadSpec) -> Result<()> {
        if spec.image_url.is_empty() {
            return Err(AgentError::InvalidRequest(
                "spec.preload.imageURL is required".into(),
            ));
        }

        let path = &self.config.preload_download_path;
        let timeout = self.config.preload_timeout;
        match spec.mode.as_str() {
            "" | MODE_STAGE => {
                let request = InstallRequest {
                    source_url: spec.image_url.clone(),
                    target_version: spec.target_version.clone(),
                    dest_path: path.clone(),
                    activate: false,
                };
                self.until_shutdown("preload install", self.device.install_package(&request, timeout))
                    .await?;
            }
            MODE_TRANSFER => {
                self.until_shutdown(
                    "preload transfer",
                    self.files.transfer_to_remote(&spec.image_url, path, timeout),
                )
                .await?;
            }
            other => {
                return Err(AgentError::InvalidRequest(format!(
                    "unsupported preload mode: {other}"
                )));
            }
        }
        Ok(())
    }
}
