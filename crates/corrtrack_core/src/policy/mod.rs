//! Authorization policy for correspondence edits.

pub mod role_policy;
