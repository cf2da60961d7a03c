//! Initial / triggered message classification
//!
//! 3GPP TS 29.274 Section 7.6 splits messages into initial messages, which
//! open a procedure, and triggered messages, which answer one. Both checks are
//! pure functions of the message type codes.

use crate::message::MessageType;

/// Message types that may open a procedure
const INITIAL_TYPES: &[MessageType] = &[
    MessageType::EchoRequest,
    MessageType::CreateSessionRequest,
    MessageType::ModifyBearerRequest,
    MessageType::DeleteSessionRequest,
    MessageType::ChangeNotificationRequest,
    MessageType::RemoteUeReportNotification,
    MessageType::ModifyBearerCommand,
    MessageType::DeleteBearerCommand,
    MessageType::BearerResourceCommand,
    MessageType::CreateBearerRequest,
    MessageType::UpdateBearerRequest,
    MessageType::DeleteBearerRequest,
    MessageType::DeletePdnConnectionSetRequest,
    MessageType::PgwDownlinkTriggeringNotification,
    MessageType::IdentificationRequest,
    MessageType::ContextRequest,
    MessageType::ForwardRelocationRequest,
    MessageType::ForwardRelocationCompleteNotification,
    MessageType::ForwardAccessContextNotification,
    MessageType::RelocationCancelRequest,
    MessageType::DetachNotification,
    MessageType::AlertMmeNotification,
    MessageType::UeActivityNotification,
    MessageType::UeRegistrationQueryRequest,
    MessageType::CreateForwardingTunnelRequest,
    MessageType::SuspendNotification,
    MessageType::ResumeNotification,
    MessageType::CreateIndirectDataForwardingTunnelRequest,
    MessageType::DeleteIndirectDataForwardingTunnelRequest,
    MessageType::ReleaseAccessBearersRequest,
    MessageType::DownlinkDataNotification,
    MessageType::PgwRestartNotification,
    MessageType::UpdatePdnConnectionSetRequest,
    MessageType::ModifyAccessBearersRequest,
    MessageType::MbmsSessionStartRequest,
    MessageType::MbmsSessionUpdateRequest,
    MessageType::MbmsSessionStopRequest,
];

/// Bearer requests are sent by either side (network initiated, or in answer
/// to a bearer command), so they are accepted as triggered whatever the
/// initial type was.
const BIDIRECTIONAL_TRIGGERED_TYPES: &[MessageType] = &[
    MessageType::CreateBearerRequest,
    MessageType::UpdateBearerRequest,
    MessageType::DeleteBearerRequest,
];

/// Whether `message_type` legitimately opens a procedure
pub fn is_initial_type(message_type: u8) -> bool {
    INITIAL_TYPES.contains(&MessageType::from(message_type))
}

/// Whether `triggered` is an acceptable answer to a procedure opened by `initial`.
///
/// A response code is its request code plus one. An unrecognized initial type
/// is only answered by a Version Not Supported Indication. Bearer requests are
/// always accepted.
pub fn is_valid_triggered(initial: u8, triggered: u8) -> bool {
    let paired = if is_initial_type(initial) {
        initial.checked_add(1) == Some(triggered)
    } else {
        triggered == MessageType::VersionNotSupportedIndication.code()
    };

    paired || is_bidirectional_triggered(triggered)
}

/// Whether `message_type` is accepted as triggered regardless of the initial type
pub fn is_bidirectional_triggered(message_type: u8) -> bool {
    BIDIRECTIONAL_TRIGGERED_TYPES.contains(&MessageType::from(message_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_requests_and_notifications_are_initial() {
        assert!(is_initial_type(MessageType::EchoRequest.code()));
        assert!(is_initial_type(MessageType::CreateSessionRequest.code()));
        assert!(is_initial_type(MessageType::ModifyBearerCommand.code()));
        assert!(is_initial_type(MessageType::DownlinkDataNotification.code()));
        assert!(is_initial_type(MessageType::MbmsSessionStopRequest.code()));
    }

    #[test]
    fn test_responses_and_acknowledges_are_never_initial() {
        assert!(!is_initial_type(MessageType::EchoResponse.code()));
        assert!(!is_initial_type(MessageType::CreateSessionResponse.code()));
        assert!(!is_initial_type(MessageType::DownlinkDataNotificationAcknowledge.code()));
        assert!(!is_initial_type(MessageType::VersionNotSupportedIndication.code()));
        assert!(!is_initial_type(MessageType::ModifyBearerFailureIndication.code()));
        assert!(!is_initial_type(0));
        assert!(!is_initial_type(255));
    }

    #[test]
    fn test_every_initial_type_is_catalogued_and_answered_by_its_successor() {
        for initial in INITIAL_TYPES {
            let code = initial.code();
            assert!(!matches!(initial, MessageType::Unknown(_)));
            let response = MessageType::from(code + 1);
            assert!(
                !matches!(response, MessageType::Unknown(_)),
                "{} has no catalogued answer",
                initial
            );
            assert!(is_valid_triggered(code, code + 1), "{} -> {}", initial, response);
        }
    }

    #[test]
    fn test_mismatched_response_is_rejected() {
        assert!(!is_valid_triggered(
            MessageType::CreateSessionRequest.code(),
            MessageType::DeleteSessionResponse.code()
        ));
        assert!(!is_valid_triggered(
            MessageType::EchoRequest.code(),
            MessageType::EchoRequest.code()
        ));
    }

    #[test]
    fn test_bearer_requests_answer_any_initial() {
        let command = MessageType::ModifyBearerCommand.code();
        assert!(is_valid_triggered(command, MessageType::UpdateBearerRequest.code()));
        assert!(is_valid_triggered(command, MessageType::CreateBearerRequest.code()));
        assert!(is_valid_triggered(
            MessageType::DeleteBearerCommand.code(),
            MessageType::DeleteBearerRequest.code()
        ));
        assert!(is_valid_triggered(200, MessageType::DeleteBearerRequest.code()));
    }

    #[test]
    fn test_unknown_initial_only_accepts_version_not_supported() {
        let response = MessageType::CreateSessionResponse.code();
        assert!(is_valid_triggered(response, MessageType::VersionNotSupportedIndication.code()));
        assert!(!is_valid_triggered(response, response + 1));
        assert!(!is_valid_triggered(255, 0));
    }

    #[test]
    fn test_exhaustive_catalog_pairing() {
        for initial in 0..=u8::MAX {
            for triggered in 0..=u8::MAX {
                let expected = if is_bidirectional_triggered(triggered) {
                    true
                } else if is_initial_type(initial) {
                    u16::from(triggered) == u16::from(initial) + 1
                } else {
                    triggered == 3
                };
                assert_eq!(is_valid_triggered(initial, triggered), expected, "{}/{}", initial, triggered);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_initial_types_pair_with_successor(index in 0..INITIAL_TYPES.len()) {
            let initial = INITIAL_TYPES[index].code();
            prop_assert!(is_valid_triggered(initial, initial + 1));
            prop_assert!(!is_initial_type(initial + 1));
        }
    }
}
