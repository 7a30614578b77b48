// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Ordered parameter trees.
//!
//! A [`ParamGroup`] exposes its children in a stable order. The same order
//! drives UI navigation and serialization. Paths join group and parameter
//! names with `/`, skipping the root group's own name.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::bounded::ParamRef;

/// A child of a parameter group.
pub enum Child<'a> {
    Param(&'a dyn ParamRef),
    Group(&'a dyn ParamGroup),
}

impl Child<'_> {
    pub fn name(&self) -> &str {
        match self {
            Child::Param(param) => param.name(),
            Child::Group(group) => group.name(),
        }
    }
}

/// A named, ordered collection of parameters and nested groups.
pub trait ParamGroup: Send + Sync {
    fn name(&self) -> &str;

    /// Visits each direct child in declaration order.
    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(Child<'a>));

    /// Collects the direct children. Allocates; not for the audio thread.
    fn children(&self) -> Vec<Child<'_>> {
        let mut children = Vec::new();
        self.for_each_child(&mut |child| children.push(child));
        children
    }
}

/// A serialized parameter: its path, value and declared metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRecord {
    pub path: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// Result of restoring a set of records onto a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Records that matched a parameter and were applied.
    pub applied: usize,
    /// Records whose path matched nothing.
    pub unknown: Vec<String>,
}

/// Walks the tree depth-first in declaration order, calling `visit` with each
/// parameter's path.
pub fn walk(root: &dyn ParamGroup, visit: &mut dyn FnMut(&str, &dyn ParamRef)) {
    let mut path = String::new();
    walk_into(root, &mut path, visit);
}

fn walk_into(
    group: &dyn ParamGroup,
    path: &mut String,
    visit: &mut dyn FnMut(&str, &dyn ParamRef),
) {
    group.for_each_child(&mut |child| {
        let prefix_len = path.len();
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(child.name());
        match child {
            Child::Param(param) => visit(path.as_str(), param),
            Child::Group(nested) => walk_into(nested, &mut *path, &mut *visit),
        }
        path.truncate(prefix_len);
    });
}

/// Looks up a parameter by its `/`-joined path.
pub fn find<'a>(root: &'a dyn ParamGroup, path: &str) -> Option<&'a dyn ParamRef> {
    let (head, rest) = match path.split_once('/') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    let mut found = None;
    root.for_each_child(&mut |child| {
        if found.is_some() || child.name() != head {
            return;
        }
        found = match (child, rest) {
            (Child::Param(param), None) => Some(param),
            (Child::Group(nested), Some(rest)) => find(nested, rest),
            _ => None,
        };
    });
    found
}

/// Produces an ordered record for every parameter in the tree.
pub fn snapshot(root: &dyn ParamGroup) -> Vec<ParamRecord> {
    let mut records = Vec::new();
    walk(root, &mut |path, param| {
        records.push(ParamRecord {
            path: path.to_string(),
            value: param.get_f64(),
            min: param.min_f64(),
            max: param.max_f64(),
            step: param.step_f64(),
        });
    });
    records
}

/// Applies records onto the tree. Each value goes through the parameter's
/// normal bounded `set`, so out-of-range data is normalized, not rejected.
/// The recorded min/max/step are informational only.
pub fn restore(root: &dyn ParamGroup, records: &[ParamRecord]) -> RestoreReport {
    let mut report = RestoreReport::default();
    for record in records {
        match find(root, &record.path) {
            Some(param) => {
                param.set_f64(record.value);
                report.applied += 1;
            }
            None => {
                warn!(path = %record.path, "Ignoring unknown parameter");
                report.unknown.push(record.path.clone());
            }
        }
    }
    debug!(
        applied = report.applied,
        unknown = report.unknown.len(),
        "Parameters restored"
    );
    report
}
