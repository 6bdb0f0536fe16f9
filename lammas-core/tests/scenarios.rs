//! End-to-end scenarios driving the whole document: editing, undo,
//! version control and files together.

use lammas_core::document::ProjectDocument;
use lammas_core::midifile::{self, ExportOptions};
use lammas_core::persistence;
use lammas_types::{MidiEvent, TrackKind};

fn temp_path(name: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("lammas-scenario-{}-{}", std::process::id(), name));
    path
}

/// S1: a note survives a save/load round trip field by field.
#[test]
fn round_trip_note() {
    let mut doc = ProjectDocument::new("Round trip");
    let piano = doc.default_piano_track().unwrap();
    doc.checkpoint();
    let note = doc.add_note(piano, 60, 0.0, 1.0, 0.5).unwrap();

    let path = temp_path("s1.json");
    persistence::save_project(&path, &doc).expect("save");
    let loaded = persistence::load_project(&path).expect("load");
    std::fs::remove_file(&path).ok();

    let pianos: Vec<_> = loaded
        .project
        .tracks()
        .iter()
        .filter(|t| t.kind() == TrackKind::Piano)
        .collect();
    assert_eq!(1, pianos.len());
    let events = pianos[0].sequence().events();
    assert_eq!(1, events.len());
    let MidiEvent::Note(restored) = &events[0] else {
        panic!("expected a note");
    };
    assert_eq!(60, restored.key());
    assert_eq!(0.0, restored.beat());
    assert_eq!(1.0, restored.length());
    assert_eq!(0.5, restored.velocity());
    assert_eq!(note.id(), restored.id());
}

/// S2: undoing an insert removes the note; redo restores it, same id.
#[test]
fn undo_insert() {
    let mut doc = ProjectDocument::new("Undo");
    let piano = doc.default_piano_track().unwrap();
    doc.checkpoint();
    let note = doc.add_note(piano, 60, 0.0, 1.0, 0.5).unwrap();

    assert!(doc.undo());
    assert!(doc.project.track(piano).unwrap().sequence().is_empty());

    assert!(doc.redo());
    let events = doc.project.track(piano).unwrap().sequence().events();
    assert_eq!(note.id(), events[0].id());
}

/// S3: consecutive changes inside one checkpoint coalesce into one step.
#[test]
fn coalesced_change() {
    let mut doc = ProjectDocument::new("Coalesce");
    let piano = doc.default_piano_track().unwrap();
    doc.checkpoint();
    let note = doc.add_note(piano, 60, 0.0, 1.0, 0.5).unwrap();

    let at_61 = note.with_key(61);
    let at_62 = note.with_key(62);
    doc.checkpoint();
    assert!(doc.change_event(piano, note.into(), at_61.into(), true));
    assert!(doc.change_event(piano, at_61.into(), at_62.into(), true));

    assert!(doc.undo());
    let events = doc.project.track(piano).unwrap().sequence().events();
    let MidiEvent::Note(current) = &events[0] else {
        panic!("expected a note");
    };
    assert_eq!(60, current.key(), "one undo jumps 62 -> 60, not 61");
}

/// S4: a full commit leaves an empty diff; a later edit resets cleanly.
#[test]
fn commit_and_reset() {
    let mut doc = ProjectDocument::new("Commit");
    let piano = doc.default_piano_track().unwrap();
    doc.checkpoint();
    for (i, key) in [60, 64, 67].iter().enumerate() {
        doc.add_note(piano, *key, i as f32, 1.0, 0.5).unwrap();
    }
    assert!(doc.commit_all("add"));
    assert!(doc.vcs.diff(&doc.project).is_empty());

    doc.checkpoint();
    doc.add_note(piano, 72, 3.0, 1.0, 0.5).unwrap();
    let committed = doc.project.clone();
    assert!(doc.vcs.reset_all_changes(&mut doc.project));

    let events = doc.project.track(piano).unwrap().sequence().events();
    assert_eq!(3, events.len());
    assert_ne!(
        committed.track(piano).unwrap().sequence().len(),
        events.len()
    );
    assert!(doc.vcs.diff(&doc.project).is_empty());
}

/// S5: two branches commit different notes; merging keeps both, ids
/// intact.
#[test]
fn branch_and_merge() {
    let mut doc = ProjectDocument::new("Merge");
    let piano = doc.default_piano_track().unwrap();
    let r0 = doc.vcs.heading_revision();

    doc.checkpoint();
    let a = doc.add_note(piano, 60, 0.0, 1.0, 0.5).unwrap();
    assert!(doc.commit_all("add A"));
    let c1 = doc.vcs.heading_revision();

    assert!(doc.checkout(r0));
    doc.checkpoint();
    let b = doc.add_note(piano, 64, 1.0, 1.0, 0.5).unwrap();
    assert!(doc.commit_all("add B"));
    let c2 = doc.vcs.heading_revision();

    assert!(doc.checkout(c1));
    assert!(doc.vcs.merge(&mut doc.project, c2));

    let events = doc.project.track(piano).unwrap().sequence().events();
    let ids: Vec<_> = events.iter().map(|e| e.id()).collect();
    assert_eq!(2, events.len());
    assert!(ids.contains(&a.id()));
    assert!(ids.contains(&b.id()));
}

/// S6: quick stash empties the diff; restoring brings back the exact set.
#[test]
fn quick_stash() {
    let mut doc = ProjectDocument::new("Stash");
    let piano = doc.default_piano_track().unwrap();
    doc.checkpoint();
    doc.add_note(piano, 60, 0.0, 1.0, 0.5).unwrap();
    assert!(doc.commit_all("baseline"));

    doc.checkpoint();
    doc.add_note(piano, 72, 2.0, 0.5, 0.9).unwrap();
    let annotations = doc
        .project
        .tracks()
        .iter()
        .find(|t| t.kind() == TrackKind::Annotations)
        .map(|t| t.id())
        .unwrap();
    doc.add_annotation(annotations, 2.0, "loud part", "#aa0000")
        .unwrap();
    let dirty = doc.project.clone();

    assert!(doc.vcs.quick_stash_all(&mut doc.project));
    assert!(doc.vcs.diff(&doc.project).is_empty());

    assert!(doc.vcs.restore_quick_stash(&mut doc.project));
    assert_eq!(
        dirty.track(piano).unwrap().sequence().events(),
        doc.project.track(piano).unwrap().sequence().events()
    );
    assert_eq!(
        dirty.track(annotations).unwrap().sequence().events(),
        doc.project.track(annotations).unwrap().sequence().events()
    );
}

/// Checking out a revision reproduces the committed state exactly
/// (project equality, not just spot checks).
#[test]
fn checkout_reproduces_committed_state() {
    let mut doc = ProjectDocument::new("Checkout");
    let piano = doc.default_piano_track().unwrap();

    doc.checkpoint();
    doc.add_note(piano, 60, 0.0, 1.0, 0.5).unwrap();
    doc.add_note(piano, 64, 1.0, 1.0, 0.5).unwrap();
    assert!(doc.commit_all("two notes"));
    let c1 = doc.vcs.heading_revision();
    let committed = doc.project.clone();

    doc.checkpoint();
    doc.add_note(piano, 67, 2.0, 1.0, 0.5).unwrap();
    assert!(doc.commit_all("third note"));

    assert!(doc.checkout(c1));
    assert_eq!(
        committed.track(piano).unwrap().sequence().events(),
        doc.project.track(piano).unwrap().sequence().events()
    );
    assert!(doc.vcs.diff(&doc.project).is_empty());
}

/// The exported MIDI is identical before and after a file round trip.
#[test]
fn export_is_stable_across_save_and_load() {
    let mut doc = ProjectDocument::new("Export");
    let piano = doc.default_piano_track().unwrap();
    doc.checkpoint();
    doc.add_note(piano, 60, 0.0, 1.0, 0.5).unwrap();
    let plain = doc.add_note(piano, 64, 1.0, 1.0, 0.8).unwrap();
    let tripled = plain.with_tuplet(3);
    assert!(doc.change_event(piano, plain.into(), tripled.into(), true));

    let options = ExportOptions::default();
    let first = midifile::render(&doc.project, &options);

    let path = temp_path("export.lammas");
    persistence::save_project(&path, &doc).expect("save");
    let loaded = persistence::load_project(&path).expect("load");
    std::fs::remove_file(&path).ok();

    assert_eq!(first, midifile::render(&loaded.project, &options));
}
