//! Program resolution with default-stage / default-mood fallback.

use super::program::{FrameProgram, ProgramTable};

/// A resolved request: the keys actually used and their program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'t> {
    pub stage: &'t str,
    pub mood: &'t str,
    pub program: &'t FrameProgram,
}

/// Pick the program for a requested (stage, mood).
pub fn resolve<'t>(table: &'t ProgramTable, stage: &str, mood: &str) -> &'t FrameProgram {
    resolve_entry(table, stage, mood).program
}

/// Like `resolve`, but also reports which table keys were used.
///
/// An unknown stage falls back to the table's default stage, and an unknown
/// mood falls back to the default mood within whichever stage was chosen.
/// If that stage lacks the default mood too, the table-wide default program
/// is used. Table validation guarantees that last pair exists.
pub fn resolve_entry<'t>(table: &'t ProgramTable, stage: &str, mood: &str) -> Resolution<'t> {
    let (stage_key, programs) = match table.stage_entry(stage) {
        Some(entry) => entry,
        None => {
            log::debug!("unknown stage {stage:?}, using {:?}", table.default_stage());
            (table.default_stage(), default_stage_programs(table))
        }
    };

    if let Some((mood_key, program)) = programs.get_key_value(mood) {
        return Resolution {
            stage: stage_key,
            mood: mood_key,
            program,
        };
    }
    log::debug!(
        "stage {stage_key:?} has no {mood:?} program, using {:?}",
        table.default_mood()
    );
    match programs.get_key_value(table.default_mood()) {
        Some((mood_key, program)) => Resolution {
            stage: stage_key,
            mood: mood_key,
            program,
        },
        None => Resolution {
            stage: table.default_stage(),
            mood: table.default_mood(),
            program: default_program(table),
        },
    }
}

fn default_stage_programs(table: &ProgramTable) -> &super::program::StagePrograms {
    match table.stage(table.default_stage()) {
        Some(programs) => programs,
        None => unreachable!("validated table lacks its default stage"),
    }
}

fn default_program(table: &ProgramTable) -> &FrameProgram {
    match table.get(table.default_stage(), table.default_mood()) {
        Some(program) => program,
        None => unreachable!("validated table lacks its default program"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn present_pairs_resolve_exactly() {
        let table = ProgramTable::builtin();
        for stage in ["baby", "teen", "adult"] {
            for mood in ["idle", "happy", "sad", "dead"] {
                let expected = table.get(stage, mood).unwrap();
                assert!(std::ptr::eq(resolve(&table, stage, mood), expected));
            }
        }
    }

    #[test]
    fn unknown_stage_uses_default_stage() {
        let table = ProgramTable::builtin();
        assert_eq!(
            resolve(&table, "elder", "happy"),
            table.get("baby", "happy").unwrap()
        );
        assert_eq!(
            resolve(&table, "elder", "sleepy"),
            table.get("baby", "idle").unwrap()
        );
    }

    #[test]
    fn unknown_mood_uses_idle_of_the_same_stage() {
        let table = ProgramTable::builtin();
        assert_eq!(
            resolve(&table, "adult", "sleepy"),
            table.get("adult", "idle").unwrap()
        );
    }

    #[test]
    fn resolution_reports_the_keys_used() {
        let table = ProgramTable::builtin();
        let r = resolve_entry(&table, "elder", "sleepy");
        assert_eq!((r.stage, r.mood), ("baby", "idle"));
        let r = resolve_entry(&table, "teen", "sad");
        assert_eq!((r.stage, r.mood), ("teen", "sad"));
    }

    #[test]
    fn keys_are_case_sensitive() {
        let table = ProgramTable::builtin();
        assert_eq!(
            resolve(&table, "Adult", "sad"),
            table.get("baby", "sad").unwrap()
        );
    }

    #[test]
    fn stage_without_default_mood_uses_table_default() {
        let mut stages = BTreeMap::new();
        stages.insert(
            "egg".to_string(),
            BTreeMap::from([("idle".to_string(), FrameProgram::linear(vec![100]))]),
        );
        stages.insert(
            "ghost".to_string(),
            BTreeMap::from([("sad".to_string(), FrameProgram::linear(vec![200, 200]))]),
        );
        let table = ProgramTable::new("egg", "idle", stages).unwrap();
        assert_eq!(
            resolve(&table, "ghost", "happy"),
            table.get("egg", "idle").unwrap()
        );
    }
}
