//! Protocol tags labelling each wire message class.
//!
//! Every message on the wire starts with a two-byte ASCII tag. The set of
//! tags is closed: codes are listed in lexicographic order of their names
//! and no two tags share a code.

use std::fmt;
use thiserror::Error;

/// Two-byte code that did not match any known tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unrecognized tag {code:?}", code = String::from_utf8_lossy(.0))]
pub struct UnrecognizedTag(pub [u8; 2]);

/// Wire message class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Tag {
    UnknownMsg = 0,
    AgreementVote,
    MsgSkip,
    NetPrioResponse,
    Ping,
    PingReply,
    ProposalPayload,
    Txn,
    UniAccountReq,
    UniCatchupReq,
    UniDecommitReq,
    UniEnsBlockReq,
    UniDecommitRes,
    UniAccountRes,
    UniEnsBlockRes,
    UniCatchupRes,
    VoteBundle,
}

impl Tag {
    /// Number of tags.
    pub const COUNT: usize = 17;

    /// Length of a tag on the wire.
    pub const LEN: usize = 2;

    /// All tags, in discriminant order.
    pub const ALL: [Tag; Tag::COUNT] = [
        Tag::UnknownMsg,
        Tag::AgreementVote,
        Tag::MsgSkip,
        Tag::NetPrioResponse,
        Tag::Ping,
        Tag::PingReply,
        Tag::ProposalPayload,
        Tag::Txn,
        Tag::UniAccountReq,
        Tag::UniCatchupReq,
        Tag::UniDecommitReq,
        Tag::UniEnsBlockReq,
        Tag::UniDecommitRes,
        Tag::UniAccountRes,
        Tag::UniEnsBlockRes,
        Tag::UniCatchupRes,
        Tag::VoteBundle,
    ];

    /// The two-byte wire code.
    pub const fn code(self) -> [u8; 2] {
        match self {
            Tag::UnknownMsg => *b"??",
            Tag::AgreementVote => *b"AV",
            Tag::MsgSkip => *b"MS",
            Tag::NetPrioResponse => *b"NP",
            Tag::Ping => *b"pi",
            Tag::PingReply => *b"pj",
            Tag::ProposalPayload => *b"PP",
            Tag::Txn => *b"TX",
            Tag::UniAccountReq => *b"UA",
            Tag::UniCatchupReq => *b"UC",
            Tag::UniDecommitReq => *b"UD",
            Tag::UniEnsBlockReq => *b"UE",
            Tag::UniDecommitRes => *b"UM",
            Tag::UniAccountRes => *b"UP",
            Tag::UniEnsBlockRes => *b"US",
            Tag::UniCatchupRes => *b"UT",
            Tag::VoteBundle => *b"VB",
        }
    }

    /// Look up a tag by its wire code.
    pub fn from_code(code: [u8; 2]) -> Result<Tag, UnrecognizedTag> {
        match &code {
            b"??" => Ok(Tag::UnknownMsg),
            b"AV" => Ok(Tag::AgreementVote),
            b"MS" => Ok(Tag::MsgSkip),
            b"NP" => Ok(Tag::NetPrioResponse),
            b"pi" => Ok(Tag::Ping),
            b"pj" => Ok(Tag::PingReply),
            b"PP" => Ok(Tag::ProposalPayload),
            b"TX" => Ok(Tag::Txn),
            b"UA" => Ok(Tag::UniAccountReq),
            b"UC" => Ok(Tag::UniCatchupReq),
            b"UD" => Ok(Tag::UniDecommitReq),
            b"UE" => Ok(Tag::UniEnsBlockReq),
            b"UM" => Ok(Tag::UniDecommitRes),
            b"UP" => Ok(Tag::UniAccountRes),
            b"US" => Ok(Tag::UniEnsBlockRes),
            b"UT" => Ok(Tag::UniCatchupRes),
            b"VB" => Ok(Tag::VoteBundle),
            _ => Err(UnrecognizedTag(code)),
        }
    }

    /// The wire code as a string slice.
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::UnknownMsg => "??",
            Tag::AgreementVote => "AV",
            Tag::MsgSkip => "MS",
            Tag::NetPrioResponse => "NP",
            Tag::Ping => "pi",
            Tag::PingReply => "pj",
            Tag::ProposalPayload => "PP",
            Tag::Txn => "TX",
            Tag::UniAccountReq => "UA",
            Tag::UniCatchupReq => "UC",
            Tag::UniDecommitReq => "UD",
            Tag::UniEnsBlockReq => "UE",
            Tag::UniDecommitRes => "UM",
            Tag::UniAccountRes => "UP",
            Tag::UniEnsBlockRes => "US",
            Tag::UniCatchupRes => "UT",
            Tag::VoteBundle => "VB",
        }
    }

    /// Slot of this tag in a dispatch table of length [`Tag::COUNT`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The paired request/response tag for synchronization sub-protocols.
    ///
    /// Tags without a pairing map to [`Tag::UnknownMsg`].
    pub const fn complement(self) -> Tag {
        match self {
            Tag::UniCatchupReq => Tag::UniCatchupRes,
            Tag::UniCatchupRes => Tag::UniCatchupReq,
            Tag::UniEnsBlockReq => Tag::UniEnsBlockRes,
            Tag::UniEnsBlockRes => Tag::UniEnsBlockReq,
            Tag::UniAccountReq => Tag::UniAccountRes,
            Tag::UniAccountRes => Tag::UniAccountReq,
            Tag::UniDecommitReq => Tag::UniDecommitRes,
            Tag::UniDecommitRes => Tag::UniDecommitReq,
            _ => Tag::UnknownMsg,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<[u8; 2]> for Tag {
    type Error = UnrecognizedTag;

    fn try_from(code: [u8; 2]) -> Result<Self, Self::Error> {
        Tag::from_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const PAIRED: [Tag; 8] = [
        Tag::UniCatchupReq,
        Tag::UniCatchupRes,
        Tag::UniEnsBlockReq,
        Tag::UniEnsBlockRes,
        Tag::UniAccountReq,
        Tag::UniAccountRes,
        Tag::UniDecommitReq,
        Tag::UniDecommitRes,
    ];

    #[test]
    fn test_codes_are_exact() {
        let expected = [
            "??", "AV", "MS", "NP", "pi", "pj", "PP", "TX", "UA", "UC", "UD", "UE", "UM", "UP",
            "US", "UT", "VB",
        ];
        for (tag, code) in Tag::ALL.iter().zip(expected) {
            assert_eq!(tag.as_str(), code);
            assert_eq!(&tag.code(), code.as_bytes());
        }
    }

    #[test]
    fn test_codes_unique_and_indices_dense() {
        let codes: HashSet<[u8; 2]> = Tag::ALL.iter().map(|t| t.code()).collect();
        assert_eq!(codes.len(), Tag::COUNT);

        for (i, tag) in Tag::ALL.iter().enumerate() {
            assert_eq!(tag.index(), i);
        }
    }

    #[test]
    fn test_from_code_roundtrip() {
        for tag in Tag::ALL {
            assert_eq!(Tag::from_code(tag.code()), Ok(tag));
        }
        assert_eq!(Tag::from_code(*b"ZZ"), Err(UnrecognizedTag(*b"ZZ")));
        assert_eq!(Tag::from_code(*b"av"), Err(UnrecognizedTag(*b"av")));
    }

    #[test]
    fn test_complement_pairs() {
        assert_eq!(Tag::UniCatchupReq.complement(), Tag::UniCatchupRes);
        assert_eq!(Tag::UniEnsBlockReq.complement(), Tag::UniEnsBlockRes);
        assert_eq!(Tag::UniAccountReq.complement(), Tag::UniAccountRes);
        assert_eq!(Tag::UniDecommitReq.complement(), Tag::UniDecommitRes);

        for tag in PAIRED {
            assert_ne!(tag.complement(), Tag::UnknownMsg);
            assert_eq!(tag.complement().complement(), tag);
        }
    }

    #[test]
    fn test_complement_unpaired_is_unknown() {
        for tag in Tag::ALL.iter().filter(|t| !PAIRED.contains(t)) {
            assert_eq!(tag.complement(), Tag::UnknownMsg, "{tag}");
        }
        assert_eq!(Tag::UnknownMsg.complement(), Tag::UnknownMsg);
    }
}
