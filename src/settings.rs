//! Effect settings — the four user-controlled parameters of a render.
//!
//! Values are range-checked on every path in (constructor, setters, serde),
//! so a held `EffectSettings` is always renderable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

pub const PITCH_RANGE: (f64, f64) = (-12.0, 12.0);
pub const FORMANT_RANGE: (f64, f64) = (-12.0, 12.0);
pub const REVERB_MIX_RANGE: (f64, f64) = (0.0, 100.0);
pub const DELAY_MIX_RANGE: (f64, f64) = (0.0, 100.0);

/// One of the four settings, as named by the studio UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Pitch,
    Formant,
    ReverbMix,
    DelayMix,
}

impl SettingKey {
    pub const ALL: [SettingKey; 4] = [
        SettingKey::Pitch,
        SettingKey::Formant,
        SettingKey::ReverbMix,
        SettingKey::DelayMix,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SettingKey::Pitch => "pitch",
            SettingKey::Formant => "formant",
            SettingKey::ReverbMix => "reverbMix",
            SettingKey::DelayMix => "delayMix",
        }
    }

    /// Inclusive `(min, max)` for this setting.
    pub fn range(self) -> (f64, f64) {
        match self {
            SettingKey::Pitch => PITCH_RANGE,
            SettingKey::Formant => FORMANT_RANGE,
            SettingKey::ReverbMix => REVERB_MIX_RANGE,
            SettingKey::DelayMix => DELAY_MIX_RANGE,
        }
    }

    fn check(self, value: f64) -> Result<f64, SettingsError> {
        let name = self.name();
        if !value.is_finite() {
            return Err(SettingsError::NotFinite { name });
        }
        let (min, max) = self.range();
        if value < min || value > max {
            return Err(SettingsError::OutOfRange {
                name,
                value,
                min,
                max,
            });
        }
        Ok(value)
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pitch" => Ok(SettingKey::Pitch),
            "formant" => Ok(SettingKey::Formant),
            "reverb" | "reverbMix" => Ok(SettingKey::ReverbMix),
            "delay" | "delayMix" => Ok(SettingKey::DelayMix),
            other => Err(SettingsError::UnknownKey(other.to_string())),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pitch, formant, reverb and delay settings for one render.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawSettings")]
pub struct EffectSettings {
    /// Semitones, [-12, 12].
    pitch: f64,
    /// Decibels of gain, [-12, 12].
    formant: f64,
    /// Percent, [0, 100].
    reverb_mix: f64,
    /// Percent, [0, 100]. Also the delay time in milliseconds.
    delay_mix: f64,
}

/// Unvalidated wire form. Accepts the short UI keys as aliases.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    #[serde(default)]
    pitch: f64,
    #[serde(default)]
    formant: f64,
    #[serde(default, alias = "reverb")]
    reverb_mix: f64,
    #[serde(default, alias = "delay")]
    delay_mix: f64,
}

impl TryFrom<RawSettings> for EffectSettings {
    type Error = SettingsError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        EffectSettings::new(raw.pitch, raw.formant, raw.reverb_mix, raw.delay_mix)
    }
}

impl EffectSettings {
    /// Build settings, rejecting out-of-range or non-finite values.
    pub fn new(
        pitch: f64,
        formant: f64,
        reverb_mix: f64,
        delay_mix: f64,
    ) -> Result<Self, SettingsError> {
        Ok(EffectSettings {
            pitch: SettingKey::Pitch.check(pitch)?,
            formant: SettingKey::Formant.check(formant)?,
            reverb_mix: SettingKey::ReverbMix.check(reverb_mix)?,
            delay_mix: SettingKey::DelayMix.check(delay_mix)?,
        })
    }

    /// Parse a JSON settings object, e.g. `{"pitch": 3, "reverb": 40}`.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn formant(&self) -> f64 {
        self.formant
    }

    pub fn reverb_mix(&self) -> f64 {
        self.reverb_mix
    }

    pub fn delay_mix(&self) -> f64 {
        self.delay_mix
    }

    pub fn get(&self, key: SettingKey) -> f64 {
        match key {
            SettingKey::Pitch => self.pitch,
            SettingKey::Formant => self.formant,
            SettingKey::ReverbMix => self.reverb_mix,
            SettingKey::DelayMix => self.delay_mix,
        }
    }

    /// Update one setting. On error the settings are left unchanged.
    pub fn set(&mut self, key: SettingKey, value: f64) -> Result<(), SettingsError> {
        let value = key.check(value)?;
        match key {
            SettingKey::Pitch => self.pitch = value,
            SettingKey::Formant => self.formant = value,
            SettingKey::ReverbMix => self.reverb_mix = value,
            SettingKey::DelayMix => self.delay_mix = value,
        }
        Ok(())
    }

    /// Update one setting by its UI name (`"pitch"`, `"reverb"`, ...).
    pub fn set_by_name(&mut self, name: &str, value: f64) -> Result<(), SettingsError> {
        self.set(name.parse()?, value)
    }

    /// Returns a copy with one setting changed.
    pub fn with(mut self, key: SettingKey, value: f64) -> Result<Self, SettingsError> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Playback-rate multiplier: `2^(pitch/12)`.
    pub fn playback_rate(&self) -> f64 {
        (2.0_f64).powf(self.pitch / 12.0)
    }

    /// Linear amplitude from the formant setting: `10^(formant/20)`.
    pub fn gain(&self) -> f64 {
        (10.0_f64).powf(self.formant / 20.0)
    }

    /// Reverb send level in [0, 1].
    pub fn reverb_wet(&self) -> f64 {
        self.reverb_mix / 100.0
    }

    /// Delay time in seconds (the mix percentage read as milliseconds).
    pub fn delay_seconds(&self) -> f64 {
        self.delay_mix / 1000.0
    }

    pub fn has_reverb(&self) -> bool {
        self.reverb_mix > 0.0
    }

    pub fn has_delay(&self) -> bool {
        self.delay_mix > 0.0
    }

    /// True when a render would only copy the input to stereo.
    pub fn is_identity(&self) -> bool {
        self.pitch == 0.0 && self.formant == 0.0 && !self.has_reverb() && !self.has_delay()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        let s = EffectSettings::default();
        assert!(s.is_identity());
        assert_eq!(s.playback_rate(), 1.0);
        assert_eq!(s.gain(), 1.0);
    }

    #[test]
    fn pitch_extremes_halve_and_double_rate() {
        let low = EffectSettings::new(-12.0, 0.0, 0.0, 0.0).unwrap();
        let high = EffectSettings::new(12.0, 0.0, 0.0, 0.0).unwrap();
        assert!((low.playback_rate() - 0.5).abs() < 1e-12);
        assert!((high.playback_rate() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn formant_is_decibels() {
        let s = EffectSettings::new(0.0, 6.0, 0.0, 0.0).unwrap();
        assert!((s.gain() - 1.9952623).abs() < 1e-6);
        let s = EffectSettings::new(0.0, -12.0, 0.0, 0.0).unwrap();
        assert!((s.gain() - 0.2511886).abs() < 1e-6);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(
            EffectSettings::new(12.5, 0.0, 0.0, 0.0),
            Err(SettingsError::OutOfRange { name: "pitch", .. })
        ));
        assert!(EffectSettings::new(0.0, 0.0, 101.0, 0.0).is_err());
        assert!(EffectSettings::new(0.0, 0.0, 0.0, -1.0).is_err());
        assert!(matches!(
            EffectSettings::new(0.0, f64::NAN, 0.0, 0.0),
            Err(SettingsError::NotFinite { name: "formant" })
        ));
    }

    #[test]
    fn set_by_ui_name() {
        let mut s = EffectSettings::default();
        s.set_by_name("reverb", 40.0).unwrap();
        s.set_by_name("delayMix", 25.0).unwrap();
        assert_eq!(s.reverb_mix(), 40.0);
        assert_eq!(s.delay_mix(), 25.0);
        assert!((s.delay_seconds() - 0.025).abs() < 1e-12);

        assert!(matches!(
            s.set_by_name("echo", 1.0),
            Err(SettingsError::UnknownKey(_))
        ));
        // Failed update leaves the previous value in place
        assert!(s.set(SettingKey::ReverbMix, 150.0).is_err());
        assert_eq!(s.reverb_mix(), 40.0);
    }

    #[test]
    fn json_accepts_both_key_styles() {
        let a = EffectSettings::from_json(r#"{"pitch": 3, "formant": -2, "reverb": 50, "delay": 10}"#)
            .unwrap();
        let b = EffectSettings::from_json(
            r#"{"pitch": 3, "formant": -2, "reverbMix": 50, "delayMix": 10}"#,
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get(SettingKey::Pitch), 3.0);
    }

    #[test]
    fn json_missing_keys_default_to_zero() {
        let s = EffectSettings::from_json(r#"{"pitch": -5}"#).unwrap();
        assert_eq!(s.pitch(), -5.0);
        assert!(!s.has_reverb());
        assert!(!s.has_delay());
    }

    #[test]
    fn json_validates_ranges() {
        assert!(EffectSettings::from_json(r#"{"pitch": 40}"#).is_err());
    }

    #[test]
    fn serializes_camel_case() {
        let s = EffectSettings::new(1.0, 2.0, 3.0, 4.0).unwrap();
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"pitch":1.0,"formant":2.0,"reverbMix":3.0,"delayMix":4.0}"#);
    }
}
