//! What the wheel may land on, and the draw itself.
//! Geometry and animation belong to the shell; this only picks.

use rand_core::RngCore;
use serde::{Deserialize, Serialize};

use crate::template::{Template, WheelOption};

/// Template a sub-template option points at, as offered to the user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubTemplateTarget {
    pub id: String,
    pub name: String,
}

/// Result of one spin.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DrawOutcome {
    pub template_id: String,
    pub option: WheelOption,
    /// Set when the option links to a template that still exists.
    pub pivot: Option<SubTemplateTarget>,
    /// Whether the option was recorded as picked.
    pub hidden: bool,
    /// Eligible options left for the next spin.
    pub remaining: usize,
}

/// Enabled options, minus the picked ones when `hide_mode` is on.
/// Hidden ids that match no option are ignored.
pub fn eligible_options(template: &Template, hide_mode: bool) -> Vec<&WheelOption> {
    template
        .options
        .iter()
        .filter(|o| o.enabled && (!hide_mode || !template.is_hidden(&o.id)))
        .collect()
}

/// Uniform pick. `None` when nothing is eligible.
pub fn draw<'a, R>(eligible: &[&'a WheelOption], rng: &mut R) -> Option<&'a WheelOption>
where
    R: RngCore + ?Sized,
{
    if eligible.is_empty() {
        return None;
    }
    Some(eligible[uniform_index(rng, eligible.len())])
}

/// Index in `0..len` without modulo bias. `len` must be non-zero.
pub fn uniform_index<R>(rng: &mut R, len: usize) -> usize
where
    R: RngCore + ?Sized,
{
    let len = len as u64;
    let zone = u64::MAX - (u64::MAX % len);
    loop {
        let v = rng.next_u64();
        if v < zone {
            return (v % len) as usize;
        }
    }
}

/// Finds the live target of a sub-template option.
pub fn resolve_pivot(option: &WheelOption, templates: &[Template]) -> Option<SubTemplateTarget> {
    let target = option.target()?;
    templates
        .iter()
        .find(|t| t.id == target)
        .map(|t| SubTemplateTarget {
            id: t.id.clone(),
            name: t.name.clone(),
        })
}
