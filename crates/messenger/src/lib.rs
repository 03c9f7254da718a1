//! Messenger Platform plumbing shared by Facebook pages and Instagram
//! accounts: webhook envelope, record filtering, request verification,
//! outbound sends and profile lookups.

pub mod error;
pub mod event;
pub mod filter;
pub mod outbound;
pub mod profile;
pub mod webhook;

pub use {
    error::{Error, Result},
    event::{Delivery, Entry, Message, Messaging, Participant, WebhookEvent},
    filter::{FilterReason, InboundRecord, NormalizedBatch, normalize},
    outbound::{GraphSender, PlatformSender},
    profile::{
        GraphProfileLookup, PLACEHOLDER_NAME, ProfileCache, ProfileKey, ProfileLookup, Resolved,
    },
    webhook::{
        SIGNATURE_HEADER, SignatureError, Verification, VerificationQuery, verify_signature,
        verify_subscription,
    },
};
