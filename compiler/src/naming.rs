// naming.rs — Process-wide unique names
//
// Auto-generated names are a category prefix plus a monotonic per-prefix
// counter (`p0`, `p1`, ...). Explicit names are recorded so that later
// auto-generated names skip them and repeated explicit names can be uniqued.
//
// Preconditions: none.
// Postconditions: `unique_name` never returns the same string twice within
//   a process.
// Failure modes: none (a poisoned lock is recovered).
// Side effects: mutates the global name table.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, OnceLock, PoisonError};

#[derive(Default)]
struct NameTable {
    /// Next counter value per prefix character.
    counters: HashMap<char, u64>,
    /// Occurrence count per explicitly registered name.
    explicit: HashMap<String, u64>,
    /// Every name handed out or reserved so far.
    taken: HashSet<String>,
}

fn table() -> &'static Mutex<NameTable> {
    static TABLE: OnceLock<Mutex<NameTable>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(NameTable::default()))
}

/// A fresh name of the form `<prefix><n>`, distinct from every name produced
/// or reserved before it.
pub fn unique_name(prefix: char) -> String {
    let mut t = table().lock().unwrap_or_else(PoisonError::into_inner);
    loop {
        let counter = t.counters.entry(prefix).or_insert(0);
        let candidate = format!("{}{}", prefix, *counter);
        *counter += 1;
        if t.taken.insert(candidate.clone()) {
            return candidate;
        }
    }
}

/// Register an explicit name. The first registration returns it unchanged;
/// later ones return `name$k` for increasing `k`.
pub fn unique_name_from(name: &str) -> String {
    let mut t = table().lock().unwrap_or_else(PoisonError::into_inner);
    let seen = t.explicit.entry(name.to_string()).or_insert(0);
    let result = if *seen == 0 {
        name.to_string()
    } else {
        format!("{}${}", name, *seen)
    };
    *seen += 1;
    t.taken.insert(result.clone());
    result
}

/// Keep auto-generated names away from `name` without renaming it.
pub fn reserve(name: &str) {
    let mut t = table().lock().unwrap_or_else(PoisonError::into_inner);
    t.taken.insert(name.to_string());
}

/// Name for an anonymous entity of the given category.
pub fn make_entity_name(category: &str, prefix: char) -> String {
    let name = unique_name(prefix);
    tracing::trace!(category, name = %name, "generated entity name");
    name
}
