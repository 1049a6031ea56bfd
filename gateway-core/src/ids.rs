use derive_more::{AsRef, Deref, Display, From, Into};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            Display,
            From,
            AsRef,
            Deref,
            Into,
            Serialize,
            Deserialize,
            Default,
        )]
        pub struct $name(String);

        impl $name {
            /// Generates a fresh, unguessable identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(UserId);
opaque_id!(SessionId);
opaque_id!(TokenId);
opaque_id!(ClientId);
opaque_id!(WorkflowId);
opaque_id!(ExecutionId);
opaque_id!(AuditEventId);
opaque_id!(RequestId);
