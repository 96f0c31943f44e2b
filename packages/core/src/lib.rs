//! Domain model for the Kinship social graph.
//!
//! This crate holds the user document, its relation sets, and the pure
//! follow/privacy state machine. It performs no I/O: the `kinship-node`
//! crate loads documents, runs a transition from [`graph`], and commits every
//! touched document atomically.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | [`UserId`], [`User`], [`ProfileEdit`], [`UserSummary`], [`UserProfile`], [`Relation`] |
//! | [`graph`] | Follow/request/privacy transitions and invariant checks |
//! | [`validation`] | Profile checks via [`validate_user`], password rules via [`validate_password`] |
//!
//! # Quick start
//!
//! ```rust
//! use kinship::{graph, FollowStatus, User};
//!
//! let mut alice = User::new("alice", "Alice");
//! let mut bob = User::new("bob", "Bob");
//!
//! let status = graph::toggle_follow(&mut alice, &mut bob).unwrap();
//! assert_eq!(status, FollowStatus::Followed);
//! assert!(bob.followers.contains(&alice.id));
//! assert!(graph::check_pair(&alice, &bob).is_empty());
//! ```

pub mod graph;
pub mod types;
pub mod validation;

pub use graph::{FollowStatus, InvariantViolation, PrivacyChange, SocialError};
pub use types::{InvalidUserId, ProfileEdit, Relation, User, UserId, UserProfile, UserSummary};
pub use validation::{validate_password, validate_user, ValidationError};
