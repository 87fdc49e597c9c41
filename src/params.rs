//! Generation parameters: form field names, task tags, defaults, slider
//! ranges, and translation from form text to typed values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Multipart form field names shared by the client and the gateway.
pub mod field {
    /// First reference image (required).
    pub const REF_IMAGE1: &str = "refImage1";
    /// Second reference image (optional).
    pub const REF_IMAGE2: &str = "refImage2";
    /// Task tag of the first reference image.
    pub const REF_TASK1: &str = "refTask1";
    /// Task tag of the second reference image.
    pub const REF_TASK2: &str = "refTask2";
    /// Text prompt.
    pub const PROMPT: &str = "prompt";
    /// Negative prompt.
    pub const NEG_PROMPT: &str = "negPrompt";
    /// Seed text.
    pub const SEED: &str = "seed";
    /// Output width.
    pub const WIDTH: &str = "width";
    /// Output height.
    pub const HEIGHT: &str = "height";
    /// Reference resolution.
    pub const REF_RES: &str = "refRes";
    /// Number of sampling steps.
    pub const NUM_STEPS: &str = "numSteps";
    /// Guidance scale.
    pub const GUIDANCE: &str = "guidance";
    /// True CFG scale.
    pub const TRUE_CFG: &str = "trueCfg";
    /// First step at which true CFG applies.
    pub const CFG_START_STEP: &str = "cfgStartStep";
    /// Last step at which true CFG applies.
    pub const CFG_END_STEP: &str = "cfgEndStep";
    /// Negative guidance scale.
    pub const NEG_GUIDANCE: &str = "negGuidance";
    /// Guidance used on the first step.
    pub const FIRST_STEP_GUIDANCE: &str = "firstStepGuidance";
}

/// Seed value asking the model to pick a random seed.
pub const RANDOM_SEED: &str = "-1";

/// How a reference image should influence generation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RefTask {
    /// Image prompt.
    #[default]
    Ip,
    /// Crop (identity) reference.
    Cr,
    /// Background reference.
    Bg,
}

impl RefTask {
    /// The tag as understood by the model.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Cr => "cr",
            Self::Bg => "bg",
        }
    }
}

impl fmt::Display for RefTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefTask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ip" => Ok(Self::Ip),
            "cr" => Ok(Self::Cr),
            "bg" => Ok(Self::Bg),
            other => Err(format!("Unsupported task '{other}'. Valid: ip, cr, bg")),
        }
    }
}

/// A form field whose text could not be translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidField {
    /// The offending field name.
    pub field: &'static str,
    /// The raw text received.
    pub value: String,
}

impl fmt::Display for InvalidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid value for {}: {}", self.field, self.value)
    }
}

/// The numeric knobs forwarded to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Resolution reference images are resized to.
    pub ref_res: u32,
    /// Number of sampling steps.
    pub num_steps: u32,
    /// Guidance scale.
    pub guidance: f64,
    /// True CFG scale.
    pub true_cfg: f64,
    /// First step at which true CFG applies.
    pub cfg_start_step: u32,
    /// Last step at which true CFG applies.
    pub cfg_end_step: u32,
    /// Negative guidance scale.
    pub neg_guidance: f64,
    /// Guidance used on the first step.
    pub first_step_guidance: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            width: 768,
            height: 768,
            ref_res: 512,
            num_steps: 8,
            guidance: 1.0,
            true_cfg: 1.0,
            cfg_start_step: 0,
            cfg_end_step: 0,
            neg_guidance: 1.0,
            first_step_guidance: 0.0,
        }
    }
}

impl GenerationParams {
    /// Translate form text into typed parameters.
    ///
    /// Absent or blank fields take the defaults; present text that does not
    /// parse is rejected.
    ///
    /// # Errors
    ///
    /// Returns the first field whose text is not a valid number.
    pub fn from_form<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Result<Self, InvalidField> {
        let defaults = Self::default();
        Ok(Self {
            width: parse_int(&lookup, field::WIDTH, defaults.width)?,
            height: parse_int(&lookup, field::HEIGHT, defaults.height)?,
            ref_res: parse_int(&lookup, field::REF_RES, defaults.ref_res)?,
            num_steps: parse_int(&lookup, field::NUM_STEPS, defaults.num_steps)?,
            guidance: parse_float(&lookup, field::GUIDANCE, defaults.guidance)?,
            true_cfg: parse_float(&lookup, field::TRUE_CFG, defaults.true_cfg)?,
            cfg_start_step: parse_int(&lookup, field::CFG_START_STEP, defaults.cfg_start_step)?,
            cfg_end_step: parse_int(&lookup, field::CFG_END_STEP, defaults.cfg_end_step)?,
            neg_guidance: parse_float(&lookup, field::NEG_GUIDANCE, defaults.neg_guidance)?,
            first_step_guidance: parse_float(
                &lookup,
                field::FIRST_STEP_GUIDANCE,
                defaults.first_step_guidance,
            )?,
        })
    }
}

/// Read a task tag field, defaulting to [`RefTask::Ip`].
///
/// # Errors
///
/// Returns an error if the field holds an unknown tag.
pub fn parse_task<'a>(
    lookup: impl Fn(&str) -> Option<&'a str>,
    name: &'static str,
) -> Result<RefTask, InvalidField> {
    match present(&lookup, name) {
        None => Ok(RefTask::default()),
        Some(text) => {
            text.parse().map_err(|_| InvalidField { field: name, value: text.to_string() })
        }
    }
}

fn present<'a>(lookup: &impl Fn(&str) -> Option<&'a str>, name: &str) -> Option<&'a str> {
    lookup(name).map(str::trim).filter(|t| !t.is_empty())
}

fn parse_int<'a>(
    lookup: &impl Fn(&str) -> Option<&'a str>,
    name: &'static str,
    default: u32,
) -> Result<u32, InvalidField> {
    match present(lookup, name) {
        None => Ok(default),
        Some(text) => text.parse().map_err(|_| InvalidField { field: name, value: text.into() }),
    }
}

fn parse_float<'a>(
    lookup: &impl Fn(&str) -> Option<&'a str>,
    name: &'static str,
    default: f64,
) -> Result<f64, InvalidField> {
    match present(lookup, name) {
        None => Ok(default),
        Some(text) => text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| InvalidField { field: name, value: text.into() }),
    }
}

/// The user-adjustable numeric knobs of the generation form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slider {
    /// Output width.
    Width,
    /// Output height.
    Height,
    /// Reference resolution.
    RefRes,
    /// Number of sampling steps.
    NumSteps,
    /// Guidance scale.
    Guidance,
    /// True CFG scale.
    TrueCfg,
    /// True CFG start step.
    CfgStartStep,
    /// True CFG end step.
    CfgEndStep,
    /// Negative guidance scale.
    NegGuidance,
    /// First step guidance.
    FirstStepGuidance,
}

/// Bounds and granularity of a slider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderRange {
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Step between values.
    pub step: f64,
    /// Decimal places kept after snapping.
    pub decimals: i32,
}

impl Slider {
    /// Every slider, in form order.
    pub const ALL: [Self; 10] = [
        Self::Width,
        Self::Height,
        Self::RefRes,
        Self::NumSteps,
        Self::Guidance,
        Self::TrueCfg,
        Self::CfgStartStep,
        Self::CfgEndStep,
        Self::NegGuidance,
        Self::FirstStepGuidance,
    ];

    /// The form field this slider is sent as.
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Self::Width => field::WIDTH,
            Self::Height => field::HEIGHT,
            Self::RefRes => field::REF_RES,
            Self::NumSteps => field::NUM_STEPS,
            Self::Guidance => field::GUIDANCE,
            Self::TrueCfg => field::TRUE_CFG,
            Self::CfgStartStep => field::CFG_START_STEP,
            Self::CfgEndStep => field::CFG_END_STEP,
            Self::NegGuidance => field::NEG_GUIDANCE,
            Self::FirstStepGuidance => field::FIRST_STEP_GUIDANCE,
        }
    }

    /// The slider's range. CFG step bounds depend on the current step count.
    #[must_use]
    pub fn range(self, num_steps: f64) -> SliderRange {
        let (min, max, step, decimals) = match self {
            Self::Width | Self::Height => (384.0, 1024.0, 8.0, 0),
            Self::RefRes => (256.0, 1024.0, 8.0, 0),
            Self::NumSteps => (1.0, 50.0, 1.0, 0),
            Self::Guidance | Self::NegGuidance | Self::FirstStepGuidance => (0.0, 10.0, 0.1, 1),
            Self::TrueCfg => (0.0, 5.0, 0.1, 1),
            Self::CfgStartStep | Self::CfgEndStep => (0.0, num_steps, 1.0, 0),
        };
        SliderRange { min, max, step, decimals }
    }
}

impl SliderRange {
    /// Clamp a value into range and snap it to the nearest step.
    #[must_use]
    pub fn snap(&self, value: f64) -> f64 {
        let clamped = value.clamp(self.min, self.max);
        let stepped = ((clamped - self.min) / self.step).round() * self.step + self.min;
        let factor = 10f64.powi(self.decimals);
        ((stepped * factor).round() / factor).min(self.max)
    }

    /// Render a value as decimal form text.
    #[must_use]
    pub fn render(&self, value: f64) -> String {
        if self.decimals == 0 {
            format!("{value:.0}")
        } else {
            format!("{value}")
        }
    }
}

/// Slider positions held by the form, starting at the form's defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct SliderValues {
    width: f64,
    height: f64,
    ref_res: f64,
    num_steps: f64,
    guidance: f64,
    true_cfg: f64,
    cfg_start_step: f64,
    cfg_end_step: f64,
    neg_guidance: f64,
    first_step_guidance: f64,
}

impl Default for SliderValues {
    fn default() -> Self {
        Self {
            width: 768.0,
            height: 768.0,
            ref_res: 512.0,
            num_steps: 12.0,
            guidance: 3.5,
            true_cfg: 1.0,
            cfg_start_step: 0.0,
            cfg_end_step: 0.0,
            neg_guidance: 3.5,
            first_step_guidance: 0.0,
        }
    }
}

impl SliderValues {
    /// Current value of a slider.
    #[must_use]
    pub fn get(&self, slider: Slider) -> f64 {
        *self.slot(slider)
    }

    /// Move a slider, returning the value actually stored after clamping
    /// and snapping. Changing the step count re-clamps the CFG step sliders.
    pub fn set(&mut self, slider: Slider, value: f64) -> f64 {
        let snapped = slider.range(self.num_steps).snap(value);
        *self.slot_mut(slider) = snapped;
        if slider == Slider::NumSteps {
            for dependent in [Slider::CfgStartStep, Slider::CfgEndStep] {
                let current = self.get(dependent);
                *self.slot_mut(dependent) = dependent.range(snapped).snap(current);
            }
        }
        snapped
    }

    /// Form text for a slider.
    #[must_use]
    pub fn render(&self, slider: Slider) -> String {
        slider.range(self.num_steps).render(self.get(slider))
    }

    fn slot(&self, slider: Slider) -> &f64 {
        match slider {
            Slider::Width => &self.width,
            Slider::Height => &self.height,
            Slider::RefRes => &self.ref_res,
            Slider::NumSteps => &self.num_steps,
            Slider::Guidance => &self.guidance,
            Slider::TrueCfg => &self.true_cfg,
            Slider::CfgStartStep => &self.cfg_start_step,
            Slider::CfgEndStep => &self.cfg_end_step,
            Slider::NegGuidance => &self.neg_guidance,
            Slider::FirstStepGuidance => &self.first_step_guidance,
        }
    }

    fn slot_mut(&mut self, slider: Slider) -> &mut f64 {
        match slider {
            Slider::Width => &mut self.width,
            Slider::Height => &mut self.height,
            Slider::RefRes => &mut self.ref_res,
            Slider::NumSteps => &mut self.num_steps,
            Slider::Guidance => &mut self.guidance,
            Slider::TrueCfg => &mut self.true_cfg,
            Slider::CfgStartStep => &mut self.cfg_start_step,
            Slider::CfgEndStep => &mut self.cfg_end_step,
            Slider::NegGuidance => &mut self.neg_guidance,
            Slider::FirstStepGuidance => &mut self.first_step_guidance,
        }
    }
}
