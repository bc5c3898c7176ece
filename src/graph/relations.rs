//! Relation queries over a requirement set
//!
//! Everything here is pure: every call builds its own visited / on-stack
//! sets, so no traversal state leaks between calls.

use super::requirement::{RelationKind, ReqId, Requirement, RequirementSet};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Existing parents of a requirement (ids in `refines` that resolve)
pub fn parents_of<'a>(req: &Requirement, all: &'a RequirementSet) -> Vec<&'a Requirement> {
    req.refines.iter().filter_map(|id| all.get(id)).collect()
}

/// Active records that refine `id`
pub fn children_of<'a>(id: &ReqId, all: &'a RequirementSet) -> Vec<&'a Requirement> {
    all.values()
        .filter(|r| r.is_active() && r.refines.contains(id))
        .collect()
}

/// Active records sharing at least one parent with `req`, excluding itself
pub fn siblings_of<'a>(req: &Requirement, all: &'a RequirementSet) -> Vec<&'a Requirement> {
    if req.refines.is_empty() {
        return Vec::new();
    }
    all.values()
        .filter(|r| r.id != req.id && r.is_active())
        .filter(|r| r.refines.iter().any(|p| req.refines.contains(p)))
        .collect()
}

/// Whether any record points at `id` through any relation kind
pub fn has_incoming(id: &ReqId, all: &RequirementSet) -> bool {
    all.values().any(|r| {
        r.id != *id
            && RelationKind::ALL
                .iter()
                .any(|kind| r.relation(*kind).contains(id))
    })
}

/// Whether the record points at anything through any relation kind
pub fn has_outgoing(req: &Requirement) -> bool {
    RelationKind::ALL
        .iter()
        .any(|kind| !req.relation(*kind).is_empty())
}

fn neighbors<'a>(
    req: &'a Requirement,
    kinds: &'a [RelationKind],
    all: &'a RequirementSet,
) -> impl Iterator<Item = &'a ReqId> + 'a {
    kinds
        .iter()
        .flat_map(move |kind| req.relation(*kind).iter())
        .filter(move |id| all.contains_key(*id))
}

/// Find a cycle reachable from `start` following `kinds`.
///
/// Returns the cycle as an ordered path; the closing edge runs from the last
/// element back to the first.
pub fn find_cycle_from(
    start: &ReqId,
    kinds: &[RelationKind],
    all: &RequirementSet,
) -> Option<Vec<ReqId>> {
    let mut stack: Vec<ReqId> = Vec::new();
    let mut done: HashSet<ReqId> = HashSet::new();
    dfs_cycle(start, kinds, all, &mut stack, &mut done)
}

fn dfs_cycle(
    id: &ReqId,
    kinds: &[RelationKind],
    all: &RequirementSet,
    stack: &mut Vec<ReqId>,
    done: &mut HashSet<ReqId>,
) -> Option<Vec<ReqId>> {
    if let Some(pos) = stack.iter().position(|s| s == id) {
        return Some(stack[pos..].to_vec());
    }
    if done.contains(id) {
        return None;
    }
    let req = all.get(id)?;

    stack.push(id.clone());
    for next in neighbors(req, kinds, all) {
        if let Some(cycle) = dfs_cycle(next, kinds, all, stack, done) {
            return Some(cycle);
        }
    }
    stack.pop();
    done.insert(id.clone());
    None
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Done,
}

/// Every distinct cycle among active records following `kinds`, one sweep.
///
/// Roots are visited in id order, so the output is deterministic. Cycles
/// over the same node set are reported once. Superseded records are neither
/// roots nor neighbours.
pub fn find_cycles(kinds: &[RelationKind], all: &RequirementSet) -> Vec<Vec<ReqId>> {
    let mut marks: HashMap<ReqId, Mark> = HashMap::new();
    let mut stack: Vec<ReqId> = Vec::new();
    let mut seen: HashSet<BTreeSet<ReqId>> = HashSet::new();
    let mut cycles = Vec::new();

    for id in all.keys() {
        if !marks.contains_key(id) {
            sweep(id, kinds, all, &mut marks, &mut stack, &mut seen, &mut cycles);
        }
    }
    cycles
}

fn sweep(
    id: &ReqId,
    kinds: &[RelationKind],
    all: &RequirementSet,
    marks: &mut HashMap<ReqId, Mark>,
    stack: &mut Vec<ReqId>,
    seen: &mut HashSet<BTreeSet<ReqId>>,
    cycles: &mut Vec<Vec<ReqId>>,
) {
    let Some(req) = all.get(id).filter(|r| r.is_active()) else {
        return;
    };
    marks.insert(id.clone(), Mark::OnStack);
    stack.push(id.clone());

    for next in neighbors(req, kinds, all) {
        match marks.get(next) {
            Some(Mark::OnStack) => {
                if let Some(pos) = stack.iter().position(|s| s == next) {
                    let cycle = stack[pos..].to_vec();
                    if seen.insert(cycle.iter().cloned().collect()) {
                        cycles.push(cycle);
                    }
                }
            }
            Some(Mark::Done) => {}
            None => sweep(next, kinds, all, marks, stack, seen, cycles),
        }
    }

    stack.pop();
    marks.insert(id.clone(), Mark::Done);
}

/// Length (in nodes) of the longest `refines` chain starting at `id`.
///
/// A root counts as 1. Edges back into the current path are ignored.
pub fn refines_depth(id: &ReqId, all: &RequirementSet) -> usize {
    let mut path: HashSet<ReqId> = HashSet::new();
    depth_from(id, all, &mut path)
}

fn depth_from(id: &ReqId, all: &RequirementSet, path: &mut HashSet<ReqId>) -> usize {
    let Some(req) = all.get(id) else {
        return 0;
    };
    if !path.insert(id.clone()) {
        return 0;
    }
    let mut deepest = 0;
    for p in &req.refines {
        if !path.contains(p) {
            deepest = deepest.max(depth_from(p, all, path));
        }
    }
    path.remove(id);
    deepest + 1
}
