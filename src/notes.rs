use std::collections::HashMap;

use crate::model::{BehaviorNote, GroupedBehaviorNote, LevelCounts};

/// Groups a flat note list per student in one O(n) pass. The latest note is
/// picked with a strict `>` timestamp comparison while scanning input order,
/// so the first-encountered note wins an exact tie. Output is ordered by the
/// latest note, most recently noted student first; groups sharing a latest
/// timestamp order ascending by student id.
pub fn group_behavior_notes(notes: &[BehaviorNote]) -> Vec<GroupedBehaviorNote> {
    struct Acc {
        student_name: String,
        notes: Vec<BehaviorNote>,
        latest: usize,
        counts: LevelCounts,
    }

    let mut by_student: HashMap<String, Acc> = HashMap::new();
    for note in notes {
        let acc = by_student
            .entry(note.student_id.clone())
            .or_insert_with(|| Acc {
                student_name: String::new(),
                notes: Vec::new(),
                latest: 0,
                counts: LevelCounts::default(),
            });
        if acc.student_name.is_empty() && !note.student_name.is_empty() {
            acc.student_name = note.student_name.clone();
        }
        acc.counts.bump(note.level);
        acc.notes.push(note.clone());
        let idx = acc.notes.len() - 1;
        if note.created_at > acc.notes[acc.latest].created_at {
            acc.latest = idx;
        }
    }

    let mut groups: Vec<GroupedBehaviorNote> = by_student
        .into_iter()
        .map(|(student_id, acc)| {
            let latest = acc.notes[acc.latest].clone();
            let mut notes = acc.notes;
            // Stable sort: input order is kept among equal timestamps.
            notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let note_count = notes.len();
            GroupedBehaviorNote {
                student_id,
                student_name: acc.student_name,
                notes,
                latest,
                counts: acc.counts,
                note_count,
            }
        })
        .collect();

    groups.sort_by(|a, b| {
        b.latest
            .created_at
            .cmp(&a.latest.created_at)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    groups
}
