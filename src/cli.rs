//! CLI argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::params::{RefTask, Slider};

/// Reference-image generation gateway for the `DreamO` Space, and a client for it.
#[derive(Parser, Debug)]
#[command(name = "dreamgate", version, about)]
pub struct Cli {
    /// Verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the generation gateway.
    Serve(ServeArgs),
    /// Submit one generation to a running gateway.
    Generate(GenerateArgs),
}

/// Options for `serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides the config file).
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides the config file).
    #[arg(long)]
    pub port: Option<u16>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,
}

/// Options for `generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Base URL of the gateway.
    #[arg(long, default_value = "http://localhost:3000")]
    pub server: String,

    /// Reference Image 1 (PNG, JPEG or GIF).
    #[arg(long)]
    pub ref_image1: Option<PathBuf>,

    /// Task of Reference Image 1.
    #[arg(long, value_enum, default_value_t = RefTask::Ip)]
    pub ref_task1: RefTask,

    /// Reference Image 2 (PNG, JPEG or GIF).
    #[arg(long)]
    pub ref_image2: Option<PathBuf>,

    /// Task of Reference Image 2.
    #[arg(long, value_enum, default_value_t = RefTask::Ip)]
    pub ref_task2: RefTask,

    /// Text prompt describing the desired image.
    #[arg(conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// Path to a file containing the prompt text.
    #[arg(short = 'p', long, conflicts_with = "prompt")]
    pub prompt_file: Option<String>,

    /// Negative prompt.
    #[arg(long, default_value = "")]
    pub neg_prompt: String,

    /// Seed; -1 picks a random one.
    #[arg(long, default_value = "-1", allow_hyphen_values = true)]
    pub seed: String,

    /// Output width.
    #[arg(long)]
    pub width: Option<f64>,

    /// Output height.
    #[arg(long)]
    pub height: Option<f64>,

    /// Reference image resolution.
    #[arg(long)]
    pub ref_res: Option<f64>,

    /// Number of sampling steps.
    #[arg(long)]
    pub num_steps: Option<f64>,

    /// Guidance scale.
    #[arg(long)]
    pub guidance: Option<f64>,

    /// True CFG scale.
    #[arg(long)]
    pub true_cfg: Option<f64>,

    /// True CFG start step.
    #[arg(long)]
    pub cfg_start_step: Option<f64>,

    /// True CFG end step.
    #[arg(long)]
    pub cfg_end_step: Option<f64>,

    /// Negative guidance scale.
    #[arg(long)]
    pub neg_guidance: Option<f64>,

    /// First step guidance.
    #[arg(long)]
    pub first_step_guidance: Option<f64>,

    /// Download the generated image as JPEG.
    #[arg(long)]
    pub download: bool,

    /// Download path (auto-generated if not specified).
    #[arg(short, long, requires = "download")]
    pub output: Option<PathBuf>,
}

impl GenerateArgs {
    /// Resolve the prompt from either the positional argument or the file flag.
    ///
    /// # Errors
    ///
    /// Returns an error if neither prompt nor prompt-file is provided,
    /// or if the file cannot be read.
    pub fn resolve_prompt(&self) -> Result<String, std::io::Error> {
        if let Some(ref text) = self.prompt {
            Ok(text.clone())
        } else if let Some(ref path) = self.prompt_file {
            std::fs::read_to_string(path)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Provide a prompt string or use -p/--prompt-file",
            ))
        }
    }

    /// Slider values given on the command line, in the order they are applied.
    /// The step count comes first so the CFG step bounds follow it.
    #[must_use]
    pub fn slider_overrides(&self) -> Vec<(Slider, f64)> {
        [
            (Slider::NumSteps, self.num_steps),
            (Slider::Width, self.width),
            (Slider::Height, self.height),
            (Slider::RefRes, self.ref_res),
            (Slider::Guidance, self.guidance),
            (Slider::TrueCfg, self.true_cfg),
            (Slider::CfgStartStep, self.cfg_start_step),
            (Slider::CfgEndStep, self.cfg_end_step),
            (Slider::NegGuidance, self.neg_guidance),
            (Slider::FirstStepGuidance, self.first_step_guidance),
        ]
        .into_iter()
        .filter_map(|(slider, value)| value.map(|v| (slider, v)))
        .collect()
    }
}
