// StreamSelector - decides how a chosen catalog entry gets downloaded
//
// Handles:
// - Direct download for formats that already carry audio
// - Audio-only download
// - Video-only formats paired with the best companion audio stream

use super::errors::{DownloadError, Result};
use super::models::{DownloadPlan, StreamDescriptor, StreamKind};

pub struct StreamSelector;

impl StreamSelector {
    /// Build the download plan for `chosen_id`.
    ///
    /// Fails with `FormatNotFound` if the id is not in the catalog and with
    /// `NoCompanionAudio` if a video-only format has nothing to pair with.
    pub fn select_plan(catalog: &[StreamDescriptor], chosen_id: &str) -> Result<DownloadPlan> {
        let chosen = catalog
            .iter()
            .find(|d| d.id == chosen_id)
            .ok_or_else(|| DownloadError::FormatNotFound(chosen_id.to_string()))?;

        let plan = match chosen.kind() {
            StreamKind::VideoOnly => {
                let audio = Self::best_companion_audio(catalog)
                    .ok_or_else(|| DownloadError::NoCompanionAudio(chosen_id.to_string()))?;
                DownloadPlan::VideoPlusAudio(chosen.id.clone(), audio.id.clone())
            }
            StreamKind::AudioOnly => DownloadPlan::AudioOnly(chosen.id.clone()),
            StreamKind::Combined => DownloadPlan::Direct(chosen.id.clone()),
        };

        log::debug!("[selector] format {} -> {:?}", chosen_id, plan);
        Ok(plan)
    }

    /// Pick the audio-only stream to merge with a video-only one.
    ///
    /// Priority (descending): mp3, m4a, webm, then quality tag compared as a
    /// string. Equal keys keep catalog order.
    pub fn best_companion_audio(catalog: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
        let mut candidates: Vec<&StreamDescriptor> =
            catalog.iter().filter(|d| d.is_audio_only()).collect();

        // sort_by is stable, so ties stay in source order
        candidates.sort_by(|a, b| Self::audio_priority(b).cmp(&Self::audio_priority(a)));
        candidates.first().copied()
    }

    fn audio_priority(d: &StreamDescriptor) -> (bool, bool, bool, &str) {
        (
            d.container == "mp3",
            d.container == "m4a",
            d.container == "webm",
            d.quality_tag.as_str(),
        )
    }
}
