use std::sync::Arc;
use std::time::Duration;

use iced::widget::{button, column, container, image, text};
use iced::{Element, Length, Subscription, Task, Theme};

use facesnap_core::camera::infrastructure::ffmpeg_camera::FfmpegCamera;
use facesnap_core::capture::CaptureError;
use facesnap_core::detection::domain::face_detector::FaceDetector;
use facesnap_core::detection::infrastructure::model_loader::ModelLoader;
use facesnap_core::detection::infrastructure::ultraface_detector::UltraFaceDetector;
use facesnap_core::session::capture_session::{
    CaptureSession, DetectorFactory, SessionConfig, SessionError,
};
use facesnap_core::session::session_state::RenderMode;

use crate::settings::Settings;

/// UI refresh cadence; decoupled from the detection tick.
const POLL_MS: u64 = 50;

#[derive(Debug, Clone)]
pub enum Message {
    Poll,
    CapturePressed,
    RetakePressed,
}

pub struct App {
    settings: Settings,
    loader: Arc<ModelLoader>,
    session: Option<CaptureSession>,
    preview: Option<image::Handle>,
    still: Option<image::Handle>,
    has_face: bool,
    /// Blocking notice from a rejected capture.
    notice: Option<String>,
    /// Non-blocking notice when the camera could not be acquired.
    camera_notice: Option<String>,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let settings = Settings::load();
        // Materialize the file on first run so it can be edited
        settings.save();
        let loader = ModelLoader::spawn();

        (
            Self {
                settings,
                loader,
                session: None,
                preview: None,
                still: None,
                has_face: false,
                notice: None,
                camera_notice: None,
            },
            Task::none(),
        )
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Poll => self.poll(),
            Message::CapturePressed => self.capture(),
            Message::RetakePressed => self.retake(),
        }
        Task::none()
    }

    /// Starts the session once the model resolves, then mirrors the shared
    /// session state into widget handles.
    fn poll(&mut self) {
        if self.session.is_none() && self.camera_notice.is_none() && self.loader.ready() {
            self.start_session();
        }

        let Some(session) = self.session.as_ref() else {
            return;
        };
        self.has_face = session.has_face();

        match session.render_mode() {
            RenderMode::Live(Some(preview)) => {
                self.preview =
                    Some(image::Handle::from_rgba(preview.width, preview.height, preview.rgba));
                self.still = None;
            }
            RenderMode::Live(None) => {
                self.still = None;
            }
            RenderMode::Captured(still) => {
                if self.still.is_none() {
                    self.still = Some(image::Handle::from_bytes(still.png_bytes().to_vec()));
                }
            }
        }
    }

    fn start_session(&mut self) {
        let confidence = self.settings.confidence;
        let factory: DetectorFactory = Box::new(move |path| {
            Ok(Box::new(UltraFaceDetector::new(path, confidence)?) as Box<dyn FaceDetector>)
        });
        let camera = FfmpegCamera::new(self.settings.device.clone());
        let mut session = CaptureSession::new(
            self.loader.clone(),
            Box::new(camera),
            factory,
            SessionConfig {
                tick_period: Duration::from_millis(self.settings.tick_ms),
                ..Default::default()
            },
        );

        match session.start() {
            Ok(_) => self.session = Some(session),
            Err(e) => {
                log::error!("could not start capture session: {e}");
                self.camera_notice = Some(format!("Camera unavailable: {e}"));
            }
        }
    }

    fn capture(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.capture() {
            Ok(_) => self.notice = None,
            Err(SessionError::Capture(CaptureError::NoFaceDetected)) => {
                self.notice =
                    Some("No face detected! Make sure your face is in view.".to_string());
            }
            Err(e) => self.notice = Some(format!("Capture failed: {e}")),
        }
    }

    fn retake(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        self.still = None;
        self.notice = None;
        if let Err(e) = session.retake() {
            log::error!("retake failed: {e}");
            self.camera_notice = Some(format!("Camera unavailable: {e}"));
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let content: Element<'_, Message> = if let Some(still) = &self.still {
            column![
                image(still.clone()).width(Length::Fill).height(Length::Fill),
                container(button(text("Retake")).on_press(Message::RetakePressed))
                    .center_x(Length::Fill),
            ]
            .spacing(12)
            .into()
        } else {
            let preview: Element<'_, Message> = match &self.preview {
                Some(handle) => image(handle.clone())
                    .width(Length::Fill)
                    .height(Length::Fill)
                    .into(),
                None => container(text(self.status_line()).size(16))
                    .center_x(Length::Fill)
                    .center_y(Length::Fill)
                    .into(),
            };

            let capture_button = button(text("Take photo"))
                .on_press_maybe(self.has_face.then_some(Message::CapturePressed));

            let mut col = column![preview, container(capture_button).center_x(Length::Fill)]
                .spacing(12);
            if let Some(notice) = &self.notice {
                col = col.push(container(text(notice.clone()).size(14)).center_x(Length::Fill));
            }
            if let Some(notice) = &self.camera_notice {
                col = col.push(container(text(notice.clone()).size(14)).center_x(Length::Fill));
            }
            col.into()
        };

        container(content)
            .padding(16)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    pub fn theme(&self) -> Theme {
        Theme::Dark
    }

    pub fn subscription(&self) -> Subscription<Message> {
        iced::time::every(Duration::from_millis(POLL_MS)).map(|_| Message::Poll)
    }

    fn status_line(&self) -> String {
        if self.camera_notice.is_some() {
            "Live preview unavailable".to_string()
        } else if !self.loader.ready() {
            "Loading face detection model...".to_string()
        } else {
            "Starting camera...".to_string()
        }
    }
}
