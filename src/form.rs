//! The generation form: input state, validation, submission, and the
//! single visible outcome (loading, error, or result).

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

use crate::error::GenerateError;
use crate::output::{resolve_output_path, save_as_jpeg};
use crate::params::{field, RefTask, Slider, SliderValues, RANDOM_SEED};
use crate::ports::gateway_client::SubmittedFile;
use crate::ports::{GatewayClient, GatewayReply, GenerationSubmission};

/// Prompt the form starts with.
pub const DEFAULT_PROMPT: &str = "a person playing guitar in the street";

const GENERIC_FAILURE: &str = "An unexpected error occurred.";
const INVALID_RESPONSE: &str = "Invalid response structure from API.";

/// One of the two reference image slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Reference Image 1 (required).
    First,
    /// Reference Image 2 (optional).
    Second,
}

impl Slot {
    fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    fn image_field(self) -> &'static str {
        match self {
            Self::First => field::REF_IMAGE1,
            Self::Second => field::REF_IMAGE2,
        }
    }
}

/// An image picked for a reference slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    /// File name shown to the user and sent with the upload.
    pub file_name: String,
    /// Sniffed MIME type.
    pub mime_type: String,
    /// File contents.
    pub data: Vec<u8>,
    /// `data:` URL for previewing the image.
    pub preview: String,
}

impl SelectedImage {
    /// Accept PNG, JPEG or GIF bytes, judged by their content.
    ///
    /// # Errors
    ///
    /// Returns an error for any other content.
    pub fn from_bytes(file_name: &str, data: Vec<u8>) -> Result<Self, GenerateError> {
        let format = image::guess_format(&data).ok().filter(|f| {
            matches!(f, image::ImageFormat::Png | image::ImageFormat::Jpeg | image::ImageFormat::Gif)
        });
        let Some(format) = format else {
            return Err(GenerateError::InvalidArgument(format!(
                "Unsupported image '{file_name}': expected PNG, JPEG or GIF"
            )));
        };
        let mime_type = format.to_mime_type().to_string();
        let preview = format!("data:{mime_type};base64,{}", STANDARD.encode(&data));
        Ok(Self { file_name: file_name.to_string(), mime_type, data, preview })
    }
}

/// What the form currently shows. Exactly one outcome is visible at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FormStatus {
    /// Nothing submitted since the last change.
    #[default]
    Idle,
    /// A submission is in flight.
    Loading,
    /// The last submission failed.
    Failed(String),
    /// The last submission produced an image.
    Generated {
        /// Location of the generated image.
        image_url: String,
        /// Seed the model used, when reported.
        used_seed: Option<String>,
    },
}

/// Why a submission did not start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitBlocked {
    /// A submission is already in flight.
    #[error("A generation is already in progress")]
    InFlight,
    /// Slot 1 is empty.
    #[error("Please upload Reference Image 1")]
    MissingReferenceImage,
    /// The prompt is blank.
    #[error("Please enter a prompt")]
    MissingPrompt,
}

/// State of the generation form.
#[derive(Debug, Clone)]
pub struct FormController {
    images: [Option<SelectedImage>; 2],
    tasks: [RefTask; 2],
    prompt: String,
    neg_prompt: String,
    seed: String,
    sliders: SliderValues,
    status: FormStatus,
}

impl Default for FormController {
    fn default() -> Self {
        Self::new()
    }
}

impl FormController {
    /// A form holding the default inputs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            images: [None, None],
            tasks: [RefTask::Ip, RefTask::Ip],
            prompt: DEFAULT_PROMPT.to_string(),
            neg_prompt: String::new(),
            seed: RANDOM_SEED.to_string(),
            sliders: SliderValues::default(),
            status: FormStatus::Idle,
        }
    }

    /// Read an image file into a slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not PNG, JPEG or GIF.
    /// The slot is left unchanged in that case.
    pub async fn select_image(&mut self, slot: Slot, path: &Path) -> Result<(), GenerateError> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| slot.image_field().to_string(), |n| n.to_string_lossy().into_owned());
        self.put_image(slot, SelectedImage::from_bytes(&file_name, data)?);
        Ok(())
    }

    /// Place an already-read image into a slot.
    pub fn put_image(&mut self, slot: Slot, image: SelectedImage) {
        self.images[slot.index()] = Some(image);
        self.clear_results();
    }

    /// The image in a slot, if any.
    #[must_use]
    pub fn image(&self, slot: Slot) -> Option<&SelectedImage> {
        self.images[slot.index()].as_ref()
    }

    /// Set the prompt.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
        self.clear_results();
    }

    /// Set the negative prompt.
    pub fn set_neg_prompt(&mut self, neg_prompt: impl Into<String>) {
        self.neg_prompt = neg_prompt.into();
        self.clear_results();
    }

    /// Set the seed text. `-1` asks for a random seed.
    pub fn set_seed(&mut self, seed: impl Into<String>) {
        self.seed = seed.into();
        self.clear_results();
    }

    /// Set the task tag of a slot.
    pub fn set_task(&mut self, slot: Slot, task: RefTask) {
        self.tasks[slot.index()] = task;
        self.clear_results();
    }

    /// Move a slider and return the value it settled on.
    pub fn set_slider(&mut self, slider: Slider, value: f64) -> f64 {
        let stored = self.sliders.set(slider, value);
        self.clear_results();
        stored
    }

    /// Current slider positions.
    #[must_use]
    pub fn sliders(&self) -> &SliderValues {
        &self.sliders
    }

    /// What the form currently shows.
    #[must_use]
    pub fn status(&self) -> &FormStatus {
        &self.status
    }

    /// Whether the submit control is enabled.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.status != FormStatus::Loading
            && self.images[0].is_some()
            && !self.prompt.trim().is_empty()
    }

    /// Validate the inputs and enter the loading state.
    ///
    /// # Errors
    ///
    /// Returns why the submission cannot start. Validation failures are also
    /// shown as the form's error; an in-flight submission keeps loading.
    pub fn begin_submit(&mut self) -> Result<GenerationSubmission, SubmitBlocked> {
        if self.status == FormStatus::Loading {
            return Err(SubmitBlocked::InFlight);
        }
        let blocked = if self.images[0].is_none() {
            Some(SubmitBlocked::MissingReferenceImage)
        } else if self.prompt.trim().is_empty() {
            Some(SubmitBlocked::MissingPrompt)
        } else {
            None
        };
        if let Some(blocked) = blocked {
            self.status = FormStatus::Failed(blocked.to_string());
            return Err(blocked);
        }

        self.status = FormStatus::Loading;
        Ok(self.submission())
    }

    fn submission(&self) -> GenerationSubmission {
        let mut submission = GenerationSubmission::default();
        for slot in [Slot::First, Slot::Second] {
            if let Some(image) = self.image(slot) {
                submission.files.push(SubmittedFile {
                    field: slot.image_field(),
                    file_name: image.file_name.clone(),
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                });
            }
        }

        let text = &mut submission.text;
        if self.images[1].is_some() {
            text.push((field::REF_TASK2, self.tasks[1].to_string()));
        }
        text.push((field::REF_TASK1, self.tasks[0].to_string()));
        text.push((field::PROMPT, self.prompt.clone()));
        text.push((field::NEG_PROMPT, self.neg_prompt.clone()));
        text.push((field::SEED, self.seed.clone()));
        for slider in Slider::ALL {
            text.push((slider.field(), self.sliders.render(slider)));
        }
        submission
    }

    /// Leave the loading state and show the outcome of a submission.
    pub fn finish_submit(&mut self, reply: Result<GatewayReply, GenerateError>) {
        self.status = match reply {
            Ok(reply) if reply.is_success() => match reply.body.image_url.filter(|u| !u.is_empty()) {
                Some(image_url) => FormStatus::Generated {
                    image_url,
                    used_seed: reply.body.used_seed.filter(|s| !s.is_empty()),
                },
                None => FormStatus::Failed(
                    reply.body.error.unwrap_or_else(|| INVALID_RESPONSE.to_string()),
                ),
            },
            Ok(reply) => FormStatus::Failed(
                reply
                    .body
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| format!("API request failed with status {}", reply.status)),
            ),
            Err(err) => FormStatus::Failed(err.message().unwrap_or_else(|| GENERIC_FAILURE.to_string())),
        };
    }

    /// Submit the form once through `client` and return the resulting status.
    pub async fn submit(&mut self, client: &dyn GatewayClient) -> &FormStatus {
        let Ok(submission) = self.begin_submit() else {
            return &self.status;
        };
        let reply = client.submit(&submission).await;
        if let Err(err) = &reply {
            tracing::debug!(error = %err, "Gateway call failed");
        }
        self.finish_submit(reply);
        &self.status
    }

    /// Download the generated image as JPEG.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no result, the fetch fails, or the file
    /// cannot be written.
    pub async fn download(
        &self,
        client: &dyn GatewayClient,
        output: Option<&Path>,
    ) -> Result<PathBuf, GenerateError> {
        let FormStatus::Generated { image_url, .. } = &self.status else {
            return Err(GenerateError::InvalidArgument("No generated image to download".into()));
        };
        let data = client.fetch_image(image_url).await?;
        let path = resolve_output_path(output);
        save_as_jpeg(&data, &path)?;
        Ok(path)
    }

    fn clear_results(&mut self) {
        if self.status != FormStatus::Loading {
            self.status = FormStatus::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::ports::gateway_client::{FetchFuture, ReplyBody, SubmitFuture};

    /// Gateway double that answers every submission the same way.
    struct FakeGateway {
        submissions: Mutex<Vec<GenerationSubmission>>,
        reply: fn() -> Result<GatewayReply, GenerateError>,
        image: Vec<u8>,
    }

    impl FakeGateway {
        fn replying(reply: fn() -> Result<GatewayReply, GenerateError>) -> Self {
            Self { submissions: Mutex::new(Vec::new()), reply, image: Vec::new() }
        }

        fn count(&self) -> usize {
            self.submissions.lock().unwrap().len()
        }
    }

    impl GatewayClient for FakeGateway {
        fn submit(&self, submission: &GenerationSubmission) -> SubmitFuture<'_> {
            self.submissions.lock().unwrap().push(submission.clone());
            let reply = (self.reply)();
            Box::pin(async move { reply })
        }

        fn fetch_image(&self, _url: &str) -> FetchFuture<'_> {
            let data = self.image.clone();
            Box::pin(async move { Ok(data) })
        }
    }

    fn generated() -> Result<GatewayReply, GenerateError> {
        Ok(GatewayReply {
            status: 200,
            body: ReplyBody {
                image_url: Some("https://x/img.jpg".into()),
                used_seed: Some("42".into()),
                error: None,
            },
        })
    }

    fn encode(format: image::ImageFormat) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(2, 2);
        let mut buf = std::io::Cursor::new(Vec::<u8>::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn png() -> SelectedImage {
        SelectedImage::from_bytes("face.png", encode(image::ImageFormat::Png)).unwrap()
    }

    fn ready_form() -> FormController {
        let mut form = FormController::new();
        form.put_image(Slot::First, png());
        form
    }

    #[test]
    fn preview_is_a_data_url() {
        let image = png();
        assert_eq!(image.mime_type, "image/png");
        assert!(image.preview.starts_with("data:image/png;base64,iVBOR"));
    }

    #[test]
    fn rejects_unsupported_content() {
        let err = SelectedImage::from_bytes("notes.txt", b"hello".to_vec()).unwrap_err();
        assert!(err.to_string().contains("expected PNG, JPEG or GIF"));

        assert!(SelectedImage::from_bytes("a.bmp", b"BM\0\0\0\0\0\0".to_vec()).is_err());
        let gif = SelectedImage::from_bytes("a.gif", b"GIF89a\x01\0\x01\0".to_vec()).unwrap();
        assert_eq!(gif.mime_type, "image/gif");
    }

    #[tokio::test]
    async fn select_image_reads_the_file() {
        let dir = std::env::temp_dir().join("dreamgate_form_select");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("street.jpg");
        std::fs::write(&path, encode(image::ImageFormat::Jpeg)).unwrap();

        let mut form = FormController::new();
        form.select_image(Slot::Second, &path).await.unwrap();
        let image = form.image(Slot::Second).unwrap();
        assert_eq!(image.file_name, "street.jpg");
        assert_eq!(image.mime_type, "image/jpeg");
        assert!(form.image(Slot::First).is_none());

        let missing = form.select_image(Slot::First, &dir.join("absent.png")).await;
        assert!(matches!(missing, Err(GenerateError::Io(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_image_blocks_without_network() {
        let gateway = FakeGateway::replying(generated);
        let mut form = FormController::new();
        form.submit(&gateway).await;
        assert_eq!(form.status(), &FormStatus::Failed("Please upload Reference Image 1".into()));
        assert_eq!(gateway.count(), 0);
    }

    #[tokio::test]
    async fn blank_prompt_blocks_without_network() {
        let gateway = FakeGateway::replying(generated);
        let mut form = ready_form();
        form.set_prompt("   ");
        assert!(!form.can_submit());
        form.submit(&gateway).await;
        assert_eq!(form.status(), &FormStatus::Failed("Please enter a prompt".into()));
        assert_eq!(gateway.count(), 0);
    }

    #[test]
    fn second_submission_is_refused_while_loading() {
        let mut form = ready_form();
        assert!(form.can_submit());
        form.begin_submit().unwrap();
        assert!(!form.can_submit());
        assert_eq!(form.begin_submit(), Err(SubmitBlocked::InFlight));
        assert_eq!(form.status(), &FormStatus::Loading);
    }

    #[test]
    fn submission_carries_every_field_as_text() {
        let mut form = ready_form();
        form.set_task(Slot::First, RefTask::Cr);
        form.set_seed("123");
        let submission = form.begin_submit().unwrap();

        assert_eq!(submission.files.len(), 1);
        assert_eq!(submission.file(field::REF_IMAGE1).unwrap().file_name, "face.png");
        assert!(submission.text_value(field::REF_TASK2).is_none());
        assert_eq!(submission.text_value(field::REF_TASK1), Some("cr"));
        assert_eq!(submission.text_value(field::PROMPT), Some(DEFAULT_PROMPT));
        assert_eq!(submission.text_value(field::NEG_PROMPT), Some(""));
        assert_eq!(submission.text_value(field::SEED), Some("123"));
        assert_eq!(submission.text_value(field::NUM_STEPS), Some("12"));
        assert_eq!(submission.text_value(field::GUIDANCE), Some("3.5"));
        assert_eq!(submission.text_value(field::WIDTH), Some("768"));
    }

    #[test]
    fn second_slot_adds_image_and_task() {
        let mut form = ready_form();
        form.put_image(Slot::Second, png());
        form.set_task(Slot::Second, RefTask::Bg);
        let submission = form.begin_submit().unwrap();
        assert_eq!(submission.files.len(), 2);
        assert!(submission.file(field::REF_IMAGE2).is_some());
        assert_eq!(submission.text_value(field::REF_TASK2), Some("bg"));
    }

    #[tokio::test]
    async fn success_shows_image_and_seed() {
        let gateway = FakeGateway::replying(generated);
        let mut form = ready_form();
        let status = form.submit(&gateway).await.clone();
        assert_eq!(
            status,
            FormStatus::Generated { image_url: "https://x/img.jpg".into(), used_seed: Some("42".into()) }
        );
        assert_eq!(gateway.count(), 1);
    }

    #[test]
    fn ok_without_image_url_is_invalid_structure() {
        let mut form = ready_form();
        form.begin_submit().unwrap();
        form.finish_submit(Ok(GatewayReply { status: 200, body: ReplyBody::default() }));
        assert_eq!(form.status(), &FormStatus::Failed(INVALID_RESPONSE.into()));

        form.begin_submit().unwrap();
        form.finish_submit(Ok(GatewayReply {
            status: 200,
            body: ReplyBody { image_url: Some(String::new()), used_seed: Some("1".into()), error: None },
        }));
        assert_eq!(form.status(), &FormStatus::Failed(INVALID_RESPONSE.into()));
    }

    #[test]
    fn error_reply_surfaces_its_message() {
        let mut form = ready_form();
        form.begin_submit().unwrap();
        form.finish_submit(Ok(GatewayReply {
            status: 500,
            body: ReplyBody { error: Some("GPU quota exceeded".into()), ..ReplyBody::default() },
        }));
        assert_eq!(form.status(), &FormStatus::Failed("GPU quota exceeded".into()));
    }

    #[test]
    fn error_reply_without_message_names_status() {
        let mut form = ready_form();
        form.begin_submit().unwrap();
        form.finish_submit(Ok(GatewayReply { status: 502, body: ReplyBody::default() }));
        assert_eq!(form.status(), &FormStatus::Failed("API request failed with status 502".into()));
    }

    #[test]
    fn transport_error_clears_loading() {
        let mut form = ready_form();
        form.begin_submit().unwrap();
        form.finish_submit(Err(GenerateError::Api { status: 0, message: "connection refused".into() }));
        assert_eq!(form.status(), &FormStatus::Failed("connection refused".into()));
        assert!(form.can_submit());
    }

    #[tokio::test]
    async fn any_input_change_clears_the_result() {
        let gateway = FakeGateway::replying(generated);
        let mut form = ready_form();
        form.submit(&gateway).await;
        assert!(matches!(form.status(), FormStatus::Generated { .. }));
        form.set_neg_prompt("blurry");
        assert_eq!(form.status(), &FormStatus::Idle);

        form.submit(&gateway).await;
        let stored = form.set_slider(Slider::NumSteps, 99.0);
        assert!((stored - 50.0).abs() < f64::EPSILON);
        assert_eq!(form.status(), &FormStatus::Idle);
    }

    #[tokio::test]
    async fn download_converts_to_jpeg() {
        let dir = std::env::temp_dir().join("dreamgate_form_download");
        std::fs::create_dir_all(&dir).unwrap();
        let out = dir.join("result.jpg");

        let mut gateway = FakeGateway::replying(generated);
        gateway.image = encode(image::ImageFormat::Png);
        let mut form = ready_form();
        form.submit(&gateway).await;

        let saved = form.download(&gateway, Some(&out)).await.unwrap();
        assert_eq!(saved, out);
        let written = std::fs::read(&out).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), image::ImageFormat::Jpeg);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn download_needs_a_result() {
        let gateway = FakeGateway::replying(generated);
        let form = ready_form();
        assert!(form.download(&gateway, None).await.is_err());
    }
}
