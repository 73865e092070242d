use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub label: String,
    pub sound: PathBuf,
}

impl Milestone {
    pub fn new(label: impl Into<String>, sound: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            sound: sound.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneKind {
    Kill,
    MultiKill,
    Headshot,
}

impl MilestoneKind {
    pub fn label(self) -> &'static str {
        match self {
            MilestoneKind::Kill => "kill",
            MilestoneKind::MultiKill => "multi_kill",
            MilestoneKind::Headshot => "headshot",
        }
    }
}

/// When the headshot replaces table lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadshotPolicy {
    pub milestone: Milestone,
    /// Regular kill counts above this fire the headshot.
    pub after_kills: u32,
    /// Multi-kill counts above this fire the headshot when escalation is on.
    pub after_multi_kills: u32,
    pub escalate_multi_kills: bool,
}

/// Exact-match milestone lookup for regular kills and multi-kills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneTable {
    kills: BTreeMap<u32, Milestone>,
    multi_kills: BTreeMap<u32, Milestone>,
    headshot: HeadshotPolicy,
}

impl MilestoneTable {
    /// Both tables must be listed with strictly increasing counts.
    pub fn new(
        kills: Vec<(u32, Milestone)>,
        multi_kills: Vec<(u32, Milestone)>,
        headshot: HeadshotPolicy,
    ) -> Result<Self> {
        Ok(Self {
            kills: ordered(kills, "kill")?,
            multi_kills: ordered(multi_kills, "multi-kill")?,
            headshot,
        })
    }

    pub fn headshot(&self) -> &HeadshotPolicy {
        &self.headshot
    }

    pub fn kill_milestones(&self) -> impl Iterator<Item = (u32, &Milestone)> {
        self.kills.iter().map(|(count, milestone)| (*count, milestone))
    }

    pub fn multi_kill_milestones(&self) -> impl Iterator<Item = (u32, &Milestone)> {
        self.multi_kills
            .iter()
            .map(|(count, milestone)| (*count, milestone))
    }

    /// Milestone for the `kill_count`-th regular kill, if any.
    pub fn for_kill(&self, kill_count: u32) -> Option<(MilestoneKind, &Milestone)> {
        if kill_count > self.headshot.after_kills {
            return Some((MilestoneKind::Headshot, &self.headshot.milestone));
        }
        self.kills
            .get(&kill_count)
            .map(|milestone| (MilestoneKind::Kill, milestone))
    }

    /// Milestone for a streak that just reached `multi_kill_count` kills, if any.
    pub fn for_multi_kill(&self, multi_kill_count: u32) -> Option<(MilestoneKind, &Milestone)> {
        if self.headshot.escalate_multi_kills && multi_kill_count > self.headshot.after_multi_kills
        {
            return Some((MilestoneKind::Headshot, &self.headshot.milestone));
        }
        self.multi_kills
            .get(&multi_kill_count)
            .map(|milestone| (MilestoneKind::MultiKill, milestone))
    }
}

fn ordered(entries: Vec<(u32, Milestone)>, table: &str) -> Result<BTreeMap<u32, Milestone>> {
    let mut previous: Option<u32> = None;
    let mut map = BTreeMap::new();
    for (count, milestone) in entries {
        if count == 0 {
            bail!("{table} milestone '{}' must have a count of at least 1", milestone.label);
        }
        if previous.is_some_and(|prev| count <= prev) {
            bail!(
                "{table} milestone counts must be strictly increasing ('{}' at {count})",
                milestone.label
            );
        }
        previous = Some(count);
        map.insert(count, milestone);
    }
    Ok(map)
}
