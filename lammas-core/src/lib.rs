//! # lammas-core
//!
//! Backend library for the Lammas sequencer: the undoable editing pipeline,
//! the revision-tree version control, MIDI file export and project
//! persistence — independent of any UI framework.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use lammas_core::document::ProjectDocument;
//! use lammas_core::persistence;
//!
//! // 1. Create a document: the project plus its undo stack and VCS
//! let mut doc = ProjectDocument::new("My song");
//! let melody = doc.project.tracks()[0].id();
//!
//! // 2. Edit through the document; every mutation is a reversible action
//! doc.checkpoint();
//! doc.add_note(melody, 60, 0.0, 1.0, 0.5);
//! doc.undo();
//! doc.redo();
//!
//! // 3. Commit the current diff to version control
//! let all: Vec<usize> = (0..doc.vcs.diff(&doc.project).items.len()).collect();
//! doc.vcs.commit(&doc.project, &all, "first notes");
//!
//! // 4. Save (text or binary, chosen by extension)
//! persistence::save_project(std::path::Path::new("song.lammas"), &doc)?;
//! ```
//!
//! ## Module overview
//!
//! - [`document`] — `ProjectDocument`, the single entry point for editing:
//!   routes edits through undo actions and keeps the VCS diff flag honest
//! - [`undo`] — the bounded transaction stack and the action kinds
//! - [`vcs`] — revisions, deltas, the head snapshot, diffs, merge, stashes
//! - [`midifile`] — deterministic Standard MIDI File export
//! - [`persistence`] — versioned project files, text (json) or binary
//!   (MessagePack), written with a two-phase rename
//! - [`config`] — embedded defaults plus a user override (TOML)

pub mod config;
pub mod document;
pub mod midifile;
pub mod persistence;
pub mod undo;
pub mod vcs;

pub use document::ProjectDocument;
