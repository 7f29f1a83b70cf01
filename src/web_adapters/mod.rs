//! Site-specific web automation adapters, kept separate from the generic
//! web executor so a single site's DOM churn only touches its own file.

pub mod whatsapp;
