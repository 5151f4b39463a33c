use crate::error::check_mix_duration;
use crate::{AnimationStateData, Error};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct MixConfig {
    #[serde(default, rename = "defaultMix")]
    default_mix: Option<f32>,
    #[serde(default)]
    mixes: Vec<MixDef>,
}

#[derive(Debug, Deserialize)]
struct MixDef {
    from: String,
    to: String,
    duration: f32,
}

impl<P> AnimationStateData<P> {
    /// Loads mix durations from JSON:
    ///
    /// ```json
    /// { "defaultMix": 0.2, "mixes": [ { "from": "run", "to": "idle", "duration": 0.3 } ] }
    /// ```
    ///
    /// Nothing is changed if any part of the input is invalid.
    pub fn load_mixes_json(&mut self, input: &str) -> Result<(), Error> {
        let config: MixConfig = serde_json::from_str(input).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;

        let mut staged = self.clone();
        if let Some(default_mix) = config.default_mix {
            check_mix_duration(default_mix)?;
            staged.default_mix = default_mix;
        }
        for mix in &config.mixes {
            staged.set_mix(&mix.from, &mix.to, mix.duration)?;
        }
        log::debug!(
            "loaded {} mix durations, default mix {}",
            config.mixes.len(),
            staged.default_mix
        );
        *self = staged;
        Ok(())
    }
}
