//! The script being memorised, as an ordered sequence of line ids.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Ordered access to the lines of a document.
///
/// Every method that takes an id returns `UnknownLine` for ids the source
/// does not contain.
pub trait LineSource {
    fn all_line_ids(&self) -> Vec<String>;

    fn contains(&self, id: &str) -> bool;

    fn line_before(&self, id: &str) -> Result<Option<String>>;

    fn line_after(&self, id: &str) -> Result<Option<String>>;

    /// Up to `n` ids immediately before `id`, in document order.
    fn lines_before(&self, id: &str, n: usize) -> Result<Vec<String>> {
        let mut found = walk(self, id, n, |cursor| self.line_before(cursor))?;
        found.reverse();
        Ok(found)
    }

    /// Up to `n` ids immediately after `id`, in document order.
    fn lines_after(&self, id: &str, n: usize) -> Result<Vec<String>> {
        walk(self, id, n, |cursor| self.line_after(cursor))
    }

    /// First line of each scene, in document order.
    fn scene_starts(&self) -> Vec<String>;
}

// Up to `n` steps away from `id`, nearest first.
fn walk<L, F>(lines: &L, id: &str, n: usize, step: F) -> Result<Vec<String>>
where
    L: LineSource + ?Sized,
    F: Fn(&str) -> Result<Option<String>>,
{
    if !lines.contains(id) {
        return Err(Error::UnknownLine(id.to_string()));
    }
    let mut found: Vec<String> = Vec::with_capacity(n);
    while found.len() < n {
        let cursor = found.last().map_or(id, String::as_str);
        match step(cursor)? {
            Some(next) => found.push(next),
            None => break,
        }
    }
    Ok(found)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub id: String,
    pub text: String,
    pub scene: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub title: Option<String>,
    /// Index of the scene's first line.
    pub start: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    lines: Vec<ScriptLine>,
    scenes: Vec<Scene>,
    index: HashMap<String, usize>,
}

impl Script {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::parse(&raw))
    }

    /// Non-blank lines become script lines; lines starting with `#` open a
    /// new scene. Scenes without any lines are dropped.
    pub fn parse(raw: &str) -> Self {
        let mut script = Script::default();
        let mut pending_title: Option<String> = None;
        let mut open_scene = true;
        let mut occurrences: HashMap<String, usize> = HashMap::new();

        for raw_line in raw.lines() {
            let text = raw_line.trim();
            if text.is_empty() {
                continue;
            }
            if let Some(heading) = text.strip_prefix('#') {
                pending_title = Some(heading.trim_start_matches('#').trim().to_string());
                open_scene = true;
                continue;
            }

            let position = script.lines.len();
            if open_scene {
                script.scenes.push(Scene {
                    title: pending_title.take(),
                    start: position,
                });
                open_scene = false;
            }

            let id = line_id(text, &mut occurrences);
            script.index.insert(id.clone(), position);
            script.lines.push(ScriptLine {
                id,
                text: text.to_string(),
                scene: script.scenes.len() - 1,
            });
        }

        script
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.index.get(id).map(|&i| self.lines[i].text.as_str())
    }

    pub fn position(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| Error::UnknownLine(id.to_string()))
    }

    /// First line id of the 1-based scene `number`.
    pub fn scene_start(&self, number: usize) -> Option<String> {
        let scene = self.scenes.get(number.checked_sub(1)?)?;
        Some(self.lines[scene.start].id.clone())
    }
}

impl LineSource for Script {
    fn all_line_ids(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.id.clone()).collect()
    }

    fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    fn line_before(&self, id: &str) -> Result<Option<String>> {
        let i = self.position(id)?;
        Ok(i.checked_sub(1).map(|j| self.lines[j].id.clone()))
    }

    fn line_after(&self, id: &str) -> Result<Option<String>> {
        let i = self.position(id)?;
        Ok(self.lines.get(i + 1).map(|l| l.id.clone()))
    }

    fn scene_starts(&self) -> Vec<String> {
        self.scenes
            .iter()
            .map(|s| self.lines[s.start].id.clone())
            .collect()
    }
}

/// First and last line of the scene enclosing `id`, derived from the
/// source's scene starts alone.
pub fn scene_bounds<L: LineSource + ?Sized>(lines: &L, id: &str) -> Result<(String, String)> {
    if !lines.contains(id) {
        return Err(Error::UnknownLine(id.to_string()));
    }
    let all = lines.all_line_ids();
    let starts = lines.scene_starts();
    let position = |needle: &str| all.iter().position(|l| l == needle);

    let target = position(id).ok_or_else(|| Error::UnknownLine(id.to_string()))?;
    let mut first = 0;
    let mut next_start = all.len();
    for start in starts.iter().filter_map(|s| position(s)) {
        if start <= target {
            first = first.max(start);
        } else {
            next_start = next_start.min(start);
        }
    }
    Ok((all[first].clone(), all[next_start - 1].clone()))
}

// Hash of the text, with a counter so repeated lines stay distinct.
fn line_id(text: &str, occurrences: &mut HashMap<String, usize>) -> String {
    let digest = format!("{:x}", md5::compute(text.as_bytes()));
    let stem = digest[..12].to_string();
    let seen = occurrences.entry(stem.clone()).or_insert(0);
    *seen += 1;
    if *seen == 1 {
        stem
    } else {
        format!("{}-{}", stem, seen)
    }
}
