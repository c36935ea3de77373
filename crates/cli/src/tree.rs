//! Table-of-organization tree nodes
//!
//! A closed set of node kinds rendered by pattern match.

use crate::campaign::{Campaign, Unit, UnitStatus};
use events::{ForceId, UnitId};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Force {
        id: ForceId,
        name: String,
        children: Vec<TreeNode>,
    },
    Unit {
        id: UnitId,
        name: String,
        status: UnitStatus,
    },
    RemoteForce {
        id: ForceId,
        name: String,
        owner: String,
        children: Vec<TreeNode>,
    },
    RemoteUnit {
        id: UnitId,
        name: String,
        owner: String,
    },
}

impl TreeNode {
    /// Build the top-level nodes for every force in the campaign
    pub fn build(campaign: &Campaign) -> Vec<TreeNode> {
        campaign
            .forces
            .iter()
            .map(|force| {
                let units = force.units.iter().filter_map(|id| campaign.units.get(id));
                match &force.owner {
                    None => TreeNode::Force {
                        id: force.id,
                        name: force.name.clone(),
                        children: units.map(TreeNode::unit).collect(),
                    },
                    Some(owner) => TreeNode::RemoteForce {
                        id: force.id,
                        name: force.name.clone(),
                        owner: owner.clone(),
                        children: units
                            .map(|unit| TreeNode::RemoteUnit {
                                id: unit.id,
                                name: unit.name.clone(),
                                owner: owner.clone(),
                            })
                            .collect(),
                    },
                }
            })
            .collect()
    }

    fn unit(unit: &Unit) -> TreeNode {
        TreeNode::Unit {
            id: unit.id,
            name: unit.name.clone(),
            status: unit.status,
        }
    }

    /// One-line label for this node
    pub fn label(&self) -> String {
        match self {
            TreeNode::Force { name, children, .. } => {
                format!("{} ({} units)", name, children.len())
            }
            TreeNode::Unit { name, status, .. } => {
                format!("{} {}", status_icon(*status), name)
            }
            TreeNode::RemoteForce {
                name,
                owner,
                children,
                ..
            } => format!("{} [{}] ({} units)", name, owner, children.len()),
            TreeNode::RemoteUnit { name, owner, .. } => format!("~ {} [{}]", name, owner),
        }
    }

    pub fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::Force { children, .. } | TreeNode::RemoteForce { children, .. } => children,
            TreeNode::Unit { .. } | TreeNode::RemoteUnit { .. } => &[],
        }
    }

    /// Patch the leaf for `unit` in place
    ///
    /// Returns `false` if the unit is not under this node.
    pub fn refresh_unit(&mut self, unit: &Unit) -> bool {
        match self {
            TreeNode::Unit { id, name, status } if *id == unit.id => {
                *name = unit.name.clone();
                *status = unit.status;
                true
            }
            TreeNode::RemoteUnit { id, name, .. } if *id == unit.id => {
                *name = unit.name.clone();
                true
            }
            TreeNode::Force { children, .. } | TreeNode::RemoteForce { children, .. } => {
                children.iter_mut().any(|child| child.refresh_unit(unit))
            }
            TreeNode::Unit { .. } | TreeNode::RemoteUnit { .. } => false,
        }
    }

    /// Render this node and its descendants as indented lines
    pub fn render(&self, depth: usize, out: &mut String) {
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), self.label());
        for child in self.children() {
            child.render(depth + 1, out);
        }
    }
}

fn status_icon(status: UnitStatus) -> char {
    match status {
        UnitStatus::Operational => '+',
        UnitStatus::Damaged => '!',
        UnitStatus::Repairing => '*',
        UnitStatus::Destroyed => 'x',
    }
}
