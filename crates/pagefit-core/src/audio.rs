#![forbid(unsafe_code)]

//! Audio-session hint for the native app shell.
//!
//! When the site runs inside the iOS app's webview, the shell exposes an
//! `audioSession` message handler. Posting `mixWithOthers` asks it to let
//! page audio play alongside other apps. This is best effort: no bridge means
//! nothing to do, and a failing bridge is only logged.

use crate::error::BridgeError;

pub const MIX_WITH_OTHERS: &str = "mixWithOthers";

/// One-shot message channel to the native shell.
pub trait AudioBridge {
    /// Post `message` to the audio-session handler.
    ///
    /// Returns `None` when no handler is installed.
    fn post_audio_session_message(&mut self, message: &str) -> Option<Result<(), BridgeError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioHintOutcome {
    Delivered,
    Unavailable,
    Failed(BridgeError),
}

/// Ask the native shell to mix page audio with other apps.
pub fn enable_mix_with_others<B: AudioBridge + ?Sized>(bridge: &mut B) -> AudioHintOutcome {
    match bridge.post_audio_session_message(MIX_WITH_OTHERS) {
        None => {
            tracing::trace!(target: "pagefit.audio", "no audio-session bridge");
            AudioHintOutcome::Unavailable
        }
        Some(Ok(())) => {
            tracing::debug!(target: "pagefit.audio", message = MIX_WITH_OTHERS, "audio-session hint delivered");
            AudioHintOutcome::Delivered
        }
        Some(Err(err)) => {
            tracing::warn!(
                target: "pagefit.audio",
                error = %err,
                "unable to configure iOS audio session"
            );
            AudioHintOutcome::Failed(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Option<Result<(), BridgeError>>, Vec<String>);

    impl AudioBridge for Scripted {
        fn post_audio_session_message(
            &mut self,
            message: &str,
        ) -> Option<Result<(), BridgeError>> {
            self.1.push(message.to_owned());
            self.0.clone()
        }
    }

    #[test]
    fn delivered_when_bridge_accepts() {
        let mut bridge = Scripted(Some(Ok(())), Vec::new());
        assert_eq!(enable_mix_with_others(&mut bridge), AudioHintOutcome::Delivered);
        assert_eq!(bridge.1, vec![MIX_WITH_OTHERS.to_owned()]);
    }

    #[test]
    fn unavailable_without_bridge() {
        let mut bridge = Scripted(None, Vec::new());
        assert_eq!(enable_mix_with_others(&mut bridge), AudioHintOutcome::Unavailable);
    }

    #[test]
    fn failure_is_reported_not_raised() {
        let err = BridgeError::Rejected {
            bridge: "audioSession",
            message: "denied".into(),
        };
        let mut bridge = Scripted(Some(Err(err.clone())), Vec::new());
        assert_eq!(enable_mix_with_others(&mut bridge), AudioHintOutcome::Failed(err));
    }

    #[test]
    fn headless_bridge_records_message() {
        let mut host = crate::headless::HeadlessHost::new().with_audio_bridge(Ok(()));
        assert_eq!(enable_mix_with_others(&mut host), AudioHintOutcome::Delivered);
        assert_eq!(host.audio_messages(), [MIX_WITH_OTHERS]);
    }
}
