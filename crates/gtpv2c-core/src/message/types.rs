//! GTPv2-C message type catalog (3GPP TS 29.274 Table 6.1-1)

use std::fmt;

macro_rules! message_types {
    ($( $(#[$meta:meta])* $variant:ident = $code:literal, )+) => {
        /// GTPv2-C message types
        ///
        /// Codes outside the catalog are carried as [`MessageType::Unknown`] so that a
        /// datagram with an unexpected type can still be classified and discarded.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MessageType {
            $( $(#[$meta])* $variant, )+
            /// Code not present in the catalog
            Unknown(u8),
        }

        impl MessageType {
            /// Every catalogued message type, in code order
            pub const ALL: &'static [MessageType] = &[ $( MessageType::$variant, )+ ];

            /// Wire code of this message type
            pub fn code(self) -> u8 {
                match self {
                    $( MessageType::$variant => $code, )+
                    MessageType::Unknown(code) => code,
                }
            }

            /// Human readable name used in log lines
            pub fn name(self) -> &'static str {
                match self {
                    $( MessageType::$variant => stringify!($variant), )+
                    MessageType::Unknown(_) => "Unknown",
                }
            }
        }

        impl From<u8> for MessageType {
            fn from(code: u8) -> Self {
                match code {
                    $( $code => MessageType::$variant, )+
                    other => MessageType::Unknown(other),
                }
            }
        }
    };
}

message_types! {
    EchoRequest = 1,
    EchoResponse = 2,
    VersionNotSupportedIndication = 3,
    CreateSessionRequest = 32,
    CreateSessionResponse = 33,
    ModifyBearerRequest = 34,
    ModifyBearerResponse = 35,
    DeleteSessionRequest = 36,
    DeleteSessionResponse = 37,
    ChangeNotificationRequest = 38,
    ChangeNotificationResponse = 39,
    RemoteUeReportNotification = 40,
    RemoteUeReportAcknowledge = 41,
    ModifyBearerCommand = 64,
    ModifyBearerFailureIndication = 65,
    DeleteBearerCommand = 66,
    DeleteBearerFailureIndication = 67,
    BearerResourceCommand = 68,
    BearerResourceFailureIndication = 69,
    DownlinkDataNotificationFailureIndication = 70,
    TraceSessionActivation = 71,
    TraceSessionDeactivation = 72,
    StopPagingIndication = 73,
    CreateBearerRequest = 95,
    CreateBearerResponse = 96,
    UpdateBearerRequest = 97,
    UpdateBearerResponse = 98,
    DeleteBearerRequest = 99,
    DeleteBearerResponse = 100,
    DeletePdnConnectionSetRequest = 101,
    DeletePdnConnectionSetResponse = 102,
    PgwDownlinkTriggeringNotification = 103,
    PgwDownlinkTriggeringAcknowledge = 104,
    IdentificationRequest = 128,
    IdentificationResponse = 129,
    ContextRequest = 130,
    ContextResponse = 131,
    ContextAcknowledge = 132,
    ForwardRelocationRequest = 133,
    ForwardRelocationResponse = 134,
    ForwardRelocationCompleteNotification = 135,
    ForwardRelocationCompleteAcknowledge = 136,
    ForwardAccessContextNotification = 137,
    ForwardAccessContextAcknowledge = 138,
    RelocationCancelRequest = 139,
    RelocationCancelResponse = 140,
    ConfigurationTransferTunnel = 141,
    DetachNotification = 149,
    DetachAcknowledge = 150,
    CsPagingIndication = 151,
    RanInformationRelay = 152,
    AlertMmeNotification = 153,
    AlertMmeAcknowledge = 154,
    UeActivityNotification = 155,
    UeActivityAcknowledge = 156,
    IsrStatusIndication = 157,
    UeRegistrationQueryRequest = 158,
    UeRegistrationQueryResponse = 159,
    CreateForwardingTunnelRequest = 160,
    CreateForwardingTunnelResponse = 161,
    SuspendNotification = 162,
    SuspendAcknowledge = 163,
    ResumeNotification = 164,
    ResumeAcknowledge = 165,
    CreateIndirectDataForwardingTunnelRequest = 166,
    CreateIndirectDataForwardingTunnelResponse = 167,
    DeleteIndirectDataForwardingTunnelRequest = 168,
    DeleteIndirectDataForwardingTunnelResponse = 169,
    ReleaseAccessBearersRequest = 170,
    ReleaseAccessBearersResponse = 171,
    DownlinkDataNotification = 176,
    DownlinkDataNotificationAcknowledge = 177,
    PgwRestartNotification = 179,
    PgwRestartNotificationAcknowledge = 180,
    UpdatePdnConnectionSetRequest = 200,
    UpdatePdnConnectionSetResponse = 201,
    ModifyAccessBearersRequest = 211,
    ModifyAccessBearersResponse = 212,
    MbmsSessionStartRequest = 231,
    MbmsSessionStartResponse = 232,
    MbmsSessionUpdateRequest = 233,
    MbmsSessionUpdateResponse = 234,
    MbmsSessionStopRequest = 235,
    MbmsSessionStopResponse = 236,
}

impl From<MessageType> for u8 {
    fn from(message_type: MessageType) -> Self {
        message_type.code()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Unknown(code) => write!(f, "Unknown({})", code),
            known => write!(f, "{}({})", known.name(), known.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_conversion_is_consistent() {
        for message_type in MessageType::ALL {
            assert_eq!(MessageType::from(message_type.code()), *message_type);
        }
    }

    #[test]
    fn test_catalog_codes_are_strictly_increasing() {
        let codes: Vec<u8> = MessageType::ALL.iter().map(|t| t.code()).collect();
        assert!(codes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_unknown_code_round_trips() {
        let unknown = MessageType::from(250);
        assert_eq!(unknown, MessageType::Unknown(250));
        assert_eq!(u8::from(unknown), 250);
        assert_eq!(unknown.to_string(), "Unknown(250)");
    }

    #[test]
    fn test_display() {
        assert_eq!(MessageType::CreateSessionRequest.to_string(), "CreateSessionRequest(32)");
        assert_eq!(MessageType::EchoResponse.name(), "EchoResponse");
    }
}
