//! Workflow orchestrator: the session state machine.
//!
//! One `Session` owns the active mode, the resource store, every mode's
//! form inputs, busy flag, last result and last error. All mutation goes
//! through its transition methods; the UI layer reads state and executes
//! the async side effects (gateway calls) the executer derives from it.
//!
//! Modes are independent: switching is always allowed, never clears
//! another mode's state, and each mode carries its own busy flag, so
//! different modes may have requests in flight concurrently while a
//! second submission in the *same* mode is refused until the first
//! completes.
//!
//! Completions are ticketed: `begin_submit` hands out a sequence number
//! and `complete_*` drops any outcome whose ticket is no longer the
//! mode's latest, so a stale response can never overwrite a newer one.

use crate::core::attack::AttackParameters;
use crate::core::config::{MAX_PAYLOAD_CHARS, STRENGTH_DEFAULT, STRENGTH_MAX, STRENGTH_MIN};
use crate::core::gateway::{EmbedResult, ExtractResult, GatewayError, VerifyResult};
use crate::core::resources::{ImageResource, ResourceError, ResourceStore, SlotKey};
use thiserror::Error;
use tracing::{debug, info};

/// The three mutually exclusive operating modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Embed,
    ExtractWithOriginal,
    BlindVerify,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Embed, Mode::ExtractWithOriginal, Mode::BlindVerify];

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Embed => "Embed",
            Mode::ExtractWithOriginal => "Extract (With Original)",
            Mode::BlindVerify => "Verify (Blind)",
        }
    }

    /// Short name used in log events and status messages.
    pub fn short(&self) -> &'static str {
        match self {
            Mode::Embed => "embed",
            Mode::ExtractWithOriginal => "extract",
            Mode::BlindVerify => "verify",
        }
    }
}

/// A request that failed validation never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing {}", .0.label())]
    MissingResource(SlotKey),
    #[error("watermark text is empty")]
    EmptyPayload,
    #[error("watermark text exceeds {MAX_PAYLOAD_CHARS} characters")]
    PayloadTooLong,
    #[error("strength must be between {STRENGTH_MIN} and {STRENGTH_MAX}")]
    StrengthOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("{} request already in flight", .0.short())]
    Busy(Mode),
}

/// Identifies one submission within a mode. Completions carrying a
/// superseded ticket are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    mode: Mode,
    seq: u64,
}

impl Ticket {
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

#[derive(Debug, Default)]
struct ModeFlight {
    busy: bool,
    seq: u64,
}

/// Inputs of the embed form.
#[derive(Debug, Clone)]
pub struct EmbedForm {
    pub payload_text: String,
    pub strength: f64,
}

impl Default for EmbedForm {
    fn default() -> Self {
        Self {
            payload_text: String::new(),
            strength: STRENGTH_DEFAULT,
        }
    }
}

/// The whole client-side workflow state. See module docs.
pub struct Session {
    mode: Mode,
    resources: ResourceStore,

    pub embed_form: EmbedForm,
    pub attack: AttackParameters,

    embed_flight: ModeFlight,
    extract_flight: ModeFlight,
    verify_flight: ModeFlight,

    embed_result: Option<EmbedResult>,
    extract_result: Option<ExtractResult>,
    verify_result: Option<VerifyResult>,

    embed_error: Option<String>,
    extract_error: Option<String>,
    verify_error: Option<String>,
}

impl Session {
    pub fn new(resources: ResourceStore) -> Self {
        Self {
            mode: Mode::Embed,
            resources,
            embed_form: EmbedForm::default(),
            attack: AttackParameters::default(),
            embed_flight: ModeFlight::default(),
            extract_flight: ModeFlight::default(),
            verify_flight: ModeFlight::default(),
            embed_result: None,
            extract_result: None,
            verify_result: None,
            embed_error: None,
            extract_error: None,
            verify_error: None,
        }
    }

    // ── Mode ────────────────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Unconditional: allowed even while another mode is mid-flight.
    /// Never clears the other modes' inputs or results.
    pub fn switch_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            debug!(from = self.mode.short(), to = mode.short(), "mode switch");
            self.mode = mode;
        }
    }

    // ── Resources ───────────────────────────────────────────────────────────

    pub fn set_resource(
        &mut self,
        slot: SlotKey,
        resource: ImageResource,
    ) -> Result<(), ResourceError> {
        self.resources.set_resource(slot, resource)?;
        // A new input invalidates the result derived from the old one.
        match slot {
            SlotKey::EmbedInput => {
                self.embed_result = None;
                self.embed_error = None;
            }
            SlotKey::VerifyInput => {
                self.verify_result = None;
                self.verify_error = None;
            }
            SlotKey::ExtractOriginal | SlotKey::ExtractSuspect => {}
        }
        Ok(())
    }

    pub fn resource(&self, slot: SlotKey) -> Option<&ImageResource> {
        self.resources.get(slot)
    }

    pub fn preview_path(&self, slot: SlotKey) -> Option<&std::path::Path> {
        self.resources.preview_path(slot)
    }

    pub fn is_set(&self, slot: SlotKey) -> bool {
        self.resources.is_set(slot)
    }

    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    // ── Validation ──────────────────────────────────────────────────────────

    pub fn validate(&self, mode: Mode) -> Result<(), ValidationError> {
        match mode {
            Mode::Embed => {
                if !self.resources.is_set(SlotKey::EmbedInput) {
                    return Err(ValidationError::MissingResource(SlotKey::EmbedInput));
                }
                let chars = self.embed_form.payload_text.chars().count();
                if chars == 0 {
                    return Err(ValidationError::EmptyPayload);
                }
                if chars > MAX_PAYLOAD_CHARS {
                    return Err(ValidationError::PayloadTooLong);
                }
                let strength = self.embed_form.strength;
                if !(STRENGTH_MIN..=STRENGTH_MAX).contains(&strength) {
                    return Err(ValidationError::StrengthOutOfRange);
                }
                Ok(())
            }
            Mode::ExtractWithOriginal => {
                if !self.resources.is_set(SlotKey::ExtractOriginal) {
                    return Err(ValidationError::MissingResource(SlotKey::ExtractOriginal));
                }
                if !self.resources.is_set(SlotKey::ExtractSuspect) {
                    return Err(ValidationError::MissingResource(SlotKey::ExtractSuspect));
                }
                Ok(())
            }
            Mode::BlindVerify => {
                if !self.resources.is_set(SlotKey::VerifyInput) {
                    return Err(ValidationError::MissingResource(SlotKey::VerifyInput));
                }
                Ok(())
            }
        }
    }

    // ── Submission lifecycle ────────────────────────────────────────────────

    /// Validate and mark the mode in-flight. The returned ticket must be
    /// passed to the matching `complete_*` call.
    pub fn begin_submit(&mut self, mode: Mode) -> Result<Ticket, SubmitError> {
        if self.flight(mode).busy {
            return Err(SubmitError::Busy(mode));
        }
        self.validate(mode)?;
        let flight = self.flight_mut(mode);
        flight.busy = true;
        flight.seq += 1;
        let ticket = Ticket {
            mode,
            seq: flight.seq,
        };
        info!(mode = mode.short(), seq = ticket.seq, "request submitted");
        Ok(ticket)
    }

    pub fn is_busy(&self, mode: Mode) -> bool {
        self.flight(mode).busy
    }

    /// Reset the busy flag and decide whether the outcome is current.
    /// Returns `false` for stale tickets, whose outcome must be dropped.
    fn finish_flight(&mut self, ticket: Ticket) -> bool {
        let flight = self.flight_mut(ticket.mode);
        if flight.seq != ticket.seq {
            debug!(
                mode = ticket.mode.short(),
                seq = ticket.seq,
                current = flight.seq,
                "stale response dropped"
            );
            return false;
        }
        flight.busy = false;
        true
    }

    /// Returns `true` if the outcome was applied (i.e. the ticket was
    /// still current).
    pub fn complete_embed(
        &mut self,
        ticket: Ticket,
        outcome: Result<EmbedResult, GatewayError>,
    ) -> bool {
        if !self.finish_flight(ticket) {
            return false;
        }
        match outcome {
            Ok(result) => {
                info!(psnr = result.psnr, ssim = result.ssim, "embed succeeded");
                self.embed_error = None;
                self.embed_result = Some(result);
            }
            Err(e) => {
                self.embed_error = Some(e.user_message("Embed"));
            }
        }
        true
    }

    pub fn complete_extract(
        &mut self,
        ticket: Ticket,
        outcome: Result<ExtractResult, GatewayError>,
    ) -> bool {
        if !self.finish_flight(ticket) {
            return false;
        }
        match outcome {
            Ok(result) => {
                self.extract_error = None;
                self.extract_result = Some(result);
            }
            Err(e) => {
                self.extract_error = Some(e.user_message("Extract"));
            }
        }
        true
    }

    pub fn complete_verify(
        &mut self,
        ticket: Ticket,
        outcome: Result<VerifyResult, GatewayError>,
    ) -> bool {
        if !self.finish_flight(ticket) {
            return false;
        }
        match outcome {
            Ok(result) => {
                self.verify_error = None;
                self.verify_result = Some(result);
            }
            Err(e) => {
                self.verify_error = Some(e.user_message("Verify"));
            }
        }
        true
    }

    // ── Results / errors ────────────────────────────────────────────────────

    pub fn embed_result(&self) -> Option<&EmbedResult> {
        self.embed_result.as_ref()
    }

    pub fn extract_result(&self) -> Option<&ExtractResult> {
        self.extract_result.as_ref()
    }

    pub fn verify_result(&self) -> Option<&VerifyResult> {
        self.verify_result.as_ref()
    }

    pub fn last_error(&self, mode: Mode) -> Option<&str> {
        match mode {
            Mode::Embed => self.embed_error.as_deref(),
            Mode::ExtractWithOriginal => self.extract_error.as_deref(),
            Mode::BlindVerify => self.verify_error.as_deref(),
        }
    }

    // ── Cross-mode handoff ──────────────────────────────────────────────────

    /// Attack-simulator export: the attacked image becomes the suspect
    /// input of extraction and the active mode switches there. This is a
    /// deliberate, user-visible side effect; the caller notifies.
    pub fn accept_attacked(&mut self, resource: ImageResource) -> Result<(), ResourceError> {
        info!(name = resource.name(), "attacked image handed off as extraction suspect");
        self.set_resource(SlotKey::ExtractSuspect, resource)?;
        self.mode = Mode::ExtractWithOriginal;
        Ok(())
    }

    fn flight(&self, mode: Mode) -> &ModeFlight {
        match mode {
            Mode::Embed => &self.embed_flight,
            Mode::ExtractWithOriginal => &self.extract_flight,
            Mode::BlindVerify => &self.verify_flight,
        }
    }

    fn flight_mut(&mut self, mode: Mode) -> &mut ModeFlight {
        match mode {
            Mode::Embed => &mut self.embed_flight,
            Mode::ExtractWithOriginal => &mut self.extract_flight,
            Mode::BlindVerify => &mut self.verify_flight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gateway::{Alignment, AlignmentStatus};

    fn session() -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let store = ResourceStore::new(dir.path().join("previews")).unwrap();
        (dir, Session::new(store))
    }

    fn png(name: &str) -> ImageResource {
        ImageResource::new(vec![0u8; 8], "image/png", name)
    }

    fn embed_ok() -> EmbedResult {
        EmbedResult {
            image_url: "/out/1.png".into(),
            signal_map_url: None,
            psnr: 42.3,
            ssim: 0.98,
        }
    }

    fn verify_ok() -> VerifyResult {
        VerifyResult {
            verified: true,
            watermark_text: Some("abc".into()),
            confidence: Some(0.9),
            geometry: None,
        }
    }

    #[test]
    fn test_initial_state() {
        let (_dir, session) = session();
        assert_eq!(session.mode(), Mode::Embed);
        for mode in Mode::ALL {
            assert!(!session.is_busy(mode));
            assert!(session.last_error(mode).is_none());
        }
        assert!(session.embed_result().is_none());
    }

    #[test]
    fn test_embed_validation_rejects_before_network() {
        let (_dir, mut session) = session();

        // No image yet.
        assert_eq!(
            session.begin_submit(Mode::Embed),
            Err(SubmitError::Invalid(ValidationError::MissingResource(
                SlotKey::EmbedInput
            )))
        );

        session.set_resource(SlotKey::EmbedInput, png("photo.png")).unwrap();

        // Empty payload.
        assert_eq!(
            session.begin_submit(Mode::Embed),
            Err(SubmitError::Invalid(ValidationError::EmptyPayload))
        );

        // Too long (33 chars).
        session.embed_form.payload_text = "x".repeat(33);
        assert_eq!(
            session.begin_submit(Mode::Embed),
            Err(SubmitError::Invalid(ValidationError::PayloadTooLong))
        );

        // Strength out of range, both sides.
        session.embed_form.payload_text = "© 2025".into();
        session.embed_form.strength = 0.05;
        assert_eq!(
            session.begin_submit(Mode::Embed),
            Err(SubmitError::Invalid(ValidationError::StrengthOutOfRange))
        );
        session.embed_form.strength = 5.1;
        assert_eq!(
            session.begin_submit(Mode::Embed),
            Err(SubmitError::Invalid(ValidationError::StrengthOutOfRange))
        );

        // Boundaries are valid.
        session.embed_form.strength = 0.1;
        assert!(session.begin_submit(Mode::Embed).is_ok());
    }

    #[test]
    fn test_payload_boundary_32_chars() {
        let (_dir, mut session) = session();
        session.set_resource(SlotKey::EmbedInput, png("a.png")).unwrap();
        session.embed_form.payload_text = "x".repeat(32);
        assert!(session.begin_submit(Mode::Embed).is_ok());
    }

    #[test]
    fn test_busy_flag_blocks_same_mode_only() {
        let (_dir, mut session) = session();
        session.set_resource(SlotKey::EmbedInput, png("a.png")).unwrap();
        session.embed_form.payload_text = "hi".into();

        let ticket = session.begin_submit(Mode::Embed).unwrap();
        assert!(session.is_busy(Mode::Embed));
        assert_eq!(
            session.begin_submit(Mode::Embed),
            Err(SubmitError::Busy(Mode::Embed))
        );

        // A different mode may still submit concurrently.
        session.set_resource(SlotKey::VerifyInput, png("v.png")).unwrap();
        assert!(session.begin_submit(Mode::BlindVerify).is_ok());

        session.complete_embed(ticket, Ok(embed_ok()));
        assert!(!session.is_busy(Mode::Embed));
        assert!(session.begin_submit(Mode::Embed).is_ok());
    }

    #[test]
    fn test_success_stores_result_unchanged() {
        let (_dir, mut session) = session();
        session.set_resource(SlotKey::EmbedInput, png("photo.png")).unwrap();
        session.embed_form.payload_text = "© 2025".into();
        session.embed_form.strength = 1.0;

        let ticket = session.begin_submit(Mode::Embed).unwrap();
        session.complete_embed(ticket, Ok(embed_ok()));

        let result = session.embed_result().unwrap();
        assert_eq!(result.psnr, 42.3);
        assert_eq!(result.ssim, 0.98);
        assert_eq!(result.image_url, "/out/1.png");
        assert!(session.last_error(Mode::Embed).is_none());
    }

    #[test]
    fn test_failure_keeps_prior_result() {
        let (_dir, mut session) = session();
        session.set_resource(SlotKey::EmbedInput, png("a.png")).unwrap();
        session.embed_form.payload_text = "hi".into();

        let ticket = session.begin_submit(Mode::Embed).unwrap();
        session.complete_embed(ticket, Ok(embed_ok()));

        let ticket = session.begin_submit(Mode::Embed).unwrap();
        session.complete_embed(
            ticket,
            Err(GatewayError::Application {
                message: "image too small".into(),
                suggestion: None,
            }),
        );

        assert_eq!(session.last_error(Mode::Embed), Some("image too small"));
        // Prior stored result untouched by the failure.
        assert!(session.embed_result().is_some());
        assert!(!session.is_busy(Mode::Embed));
    }

    #[test]
    fn test_stale_completion_is_dropped() {
        let (_dir, mut session) = session();
        session.set_resource(SlotKey::EmbedInput, png("a.png")).unwrap();
        session.embed_form.payload_text = "hi".into();

        let stale = session.begin_submit(Mode::Embed).unwrap();
        assert!(session.complete_embed(stale, Ok(embed_ok())));

        let current = session.begin_submit(Mode::Embed).unwrap();

        // The first ticket arrives again (duplicate/late delivery): ignored.
        let mut late = embed_ok();
        late.psnr = 1.0;
        assert!(!session.complete_embed(stale, Ok(late)));
        assert_eq!(session.embed_result().unwrap().psnr, 42.3);
        assert!(session.is_busy(Mode::Embed), "stale ticket must not clear the flag");

        session.complete_embed(current, Ok(embed_ok()));
        assert!(!session.is_busy(Mode::Embed));
    }

    #[test]
    fn test_mode_independence_of_results() {
        let (_dir, mut session) = session();

        session.set_resource(SlotKey::VerifyInput, png("v.png")).unwrap();
        let ticket = session.begin_submit(Mode::BlindVerify).unwrap();
        session.complete_verify(ticket, Ok(verify_ok()));
        assert!(session.verify_result().unwrap().verified);

        // Submitting in Embed mode must not clear or alter the Verify result.
        session.set_resource(SlotKey::EmbedInput, png("a.png")).unwrap();
        session.embed_form.payload_text = "hi".into();
        let ticket = session.begin_submit(Mode::Embed).unwrap();
        session.complete_embed(ticket, Ok(embed_ok()));

        let verify = session.verify_result().unwrap();
        assert!(verify.verified);
        assert_eq!(verify.watermark_text.as_deref(), Some("abc"));
    }

    #[test]
    fn test_mode_switch_preserves_state() {
        let (_dir, mut session) = session();
        session.embed_form.payload_text = "keep me".into();
        session.switch_mode(Mode::BlindVerify);
        session.switch_mode(Mode::ExtractWithOriginal);
        session.switch_mode(Mode::Embed);
        assert_eq!(session.embed_form.payload_text, "keep me");
    }

    #[test]
    fn test_extract_requires_both_slots() {
        let (_dir, mut session) = session();
        assert!(matches!(
            session.begin_submit(Mode::ExtractWithOriginal),
            Err(SubmitError::Invalid(ValidationError::MissingResource(
                SlotKey::ExtractOriginal
            )))
        ));
        session.set_resource(SlotKey::ExtractOriginal, png("o.png")).unwrap();
        assert!(matches!(
            session.begin_submit(Mode::ExtractWithOriginal),
            Err(SubmitError::Invalid(ValidationError::MissingResource(
                SlotKey::ExtractSuspect
            )))
        ));
        session.set_resource(SlotKey::ExtractSuspect, png("s.png")).unwrap();
        assert!(session.begin_submit(Mode::ExtractWithOriginal).is_ok());
    }

    #[test]
    fn test_extract_accepts_both_alignment_outcomes() {
        let (_dir, mut session) = session();
        session.set_resource(SlotKey::ExtractOriginal, png("o.png")).unwrap();
        session.set_resource(SlotKey::ExtractSuspect, png("attacked.png")).unwrap();

        for status in [AlignmentStatus::Aligned, AlignmentStatus::Failed] {
            let ticket = session.begin_submit(Mode::ExtractWithOriginal).unwrap();
            session.complete_extract(
                ticket,
                Ok(ExtractResult {
                    decoded_text: Some("hi".into()),
                    confidence: 0.8,
                    alignment: Alignment { status },
                }),
            );
            // Both are valid terminal outcomes, never errors.
            assert!(session.last_error(Mode::ExtractWithOriginal).is_none());
            assert_eq!(session.extract_result().unwrap().alignment.status, status);
        }
    }

    #[test]
    fn test_transport_failure_completes_every_mode() {
        let (_dir, mut session) = session();
        session.set_resource(SlotKey::EmbedInput, png("a.png")).unwrap();
        session.embed_form.payload_text = "hi".into();
        session.set_resource(SlotKey::ExtractOriginal, png("o.png")).unwrap();
        session.set_resource(SlotKey::ExtractSuspect, png("s.png")).unwrap();
        session.set_resource(SlotKey::VerifyInput, png("v.png")).unwrap();

        // The same underlying failure must be reportable to each mode's
        // completion independently.
        let err = GatewayError::Transport("connection reset".to_string());

        let ticket = session.begin_submit(Mode::Embed).unwrap();
        assert!(session.complete_embed(ticket, Err(err.clone())));
        let ticket = session.begin_submit(Mode::ExtractWithOriginal).unwrap();
        assert!(session.complete_extract(ticket, Err(err.clone())));
        let ticket = session.begin_submit(Mode::BlindVerify).unwrap();
        assert!(session.complete_verify(ticket, Err(err)));

        for mode in Mode::ALL {
            assert!(!session.is_busy(mode));
            assert!(
                session.last_error(mode).unwrap().contains("unreachable"),
                "transport errors surface generically for {}",
                mode.short()
            );
        }
    }

    #[test]
    fn test_handoff_sets_suspect_and_switches_mode() {
        let (_dir, mut session) = session();
        assert_eq!(session.mode(), Mode::Embed);

        session.accept_attacked(png("attacked.png")).unwrap();

        assert_eq!(session.mode(), Mode::ExtractWithOriginal);
        assert_eq!(
            session.resource(SlotKey::ExtractSuspect).unwrap().name(),
            "attacked.png"
        );
    }

    #[test]
    fn test_new_embed_input_clears_stale_result() {
        let (_dir, mut session) = session();
        session.set_resource(SlotKey::EmbedInput, png("a.png")).unwrap();
        session.embed_form.payload_text = "hi".into();
        let ticket = session.begin_submit(Mode::Embed).unwrap();
        session.complete_embed(ticket, Ok(embed_ok()));
        assert!(session.embed_result().is_some());

        session.set_resource(SlotKey::EmbedInput, png("b.png")).unwrap();
        assert!(session.embed_result().is_none());
    }
}
