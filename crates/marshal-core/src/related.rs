use crate::api::WorkItem;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DependencyKind {
    #[serde(rename = "blocks")]
    Blocks,
    #[serde(rename = "parent-child")]
    ParentChild,
    #[serde(rename = "discovered-from")]
    DiscoveredFrom,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dependency {
    pub issue_id: String,
    pub depends_on_id: String,
    #[serde(rename = "dep_type")]
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

/// The local issue graph, loaded from the tracker's JSONL export.
/// Unparseable lines are skipped; a missing export yields an empty
/// graph. Related-work discovery is cosmetic, never an error source.
#[derive(Debug, Default)]
pub struct IssueGraph {
    issues: HashMap<String, Issue>,
}

impl IssueGraph {
    pub fn load(export: &Path) -> IssueGraph {
        let Ok(jsonl) = fs::read_to_string(export) else {
            return IssueGraph::default();
        };
        Self::from_jsonl(&jsonl)
    }

    pub fn from_jsonl(jsonl: &str) -> IssueGraph {
        let issues = jsonl
            .lines()
            .filter_map(|line| serde_json::from_str::<Issue>(line.trim()).ok())
            .map(|issue| (issue.id.clone(), issue))
            .collect();
        IssueGraph { issues }
    }

    pub fn get(&self, id: &str) -> Option<&Issue> {
        self.issues.get(id)
    }

    /// The parent epic reached through `id`'s own parent-child edge.
    fn parent_of(&self, id: &str) -> Option<&str> {
        self.issues.get(id)?.dependencies.iter().find_map(|dep| {
            (dep.kind == DependencyKind::ParentChild).then_some(dep.depends_on_id.as_str())
        })
    }

    /// Issues with a blocks edge pointing at `id`.
    fn blocked_by(&self, id: &str) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .issues
            .values()
            .filter(|issue| {
                issue
                    .dependencies
                    .iter()
                    .any(|dep| dep.kind == DependencyKind::Blocks && dep.depends_on_id == id)
            })
            .map(|issue| issue.id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Issues sharing `id`'s parent epic, excluding `id` itself.
    fn siblings_of(&self, id: &str) -> Vec<&str> {
        let Some(parent) = self.parent_of(id) else {
            return Vec::new();
        };
        let mut ids: Vec<&str> = self
            .issues
            .values()
            .filter(|issue| issue.id != id)
            .filter(|issue| self.parent_of(&issue.id) == Some(parent))
            .map(|issue| issue.id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedWorkItem {
    pub bead_id: String,
    pub title: String,
    pub alias: String,
    pub human_name: String,
    pub workspace_id: String,
    pub relation: String,
}

/// After a close, surface other agents' in-flight work related to the
/// closed issue. Dependency relations win over shared-epic relations
/// when both apply.
pub fn discover(
    graph: &IssueGraph,
    closed_id: &str,
    in_flight: &[WorkItem],
    self_workspace_id: &str,
) -> Vec<RelatedWorkItem> {
    let mut relations: Vec<(&str, String)> = graph
        .blocked_by(closed_id)
        .into_iter()
        .map(|id| (id, format!("blocked by {closed_id}")))
        .collect();
    for id in graph.siblings_of(closed_id) {
        if !relations.iter().any(|(known, _)| *known == id) {
            relations.push((id, "same parent epic".to_string()));
        }
    }

    relations
        .into_iter()
        .filter_map(|(id, relation)| {
            let item = in_flight
                .iter()
                .filter(|item| item.workspace_id != self_workspace_id)
                .filter(|item| !item.workspace_id.is_empty() && !item.alias.is_empty())
                .find(|item| item.bead_id == id)?;
            let title = if item.title.is_empty() {
                graph.get(id).map(|issue| issue.title.clone()).unwrap_or_default()
            } else {
                item.title.clone()
            };
            Some(RelatedWorkItem {
                bead_id: item.bead_id.clone(),
                title,
                alias: item.alias.clone(),
                human_name: item.human_name.clone(),
                workspace_id: item.workspace_id.clone(),
                relation,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAPH: &str = concat!(
        "{\"id\":\"bd-epic\",\"title\":\"Epic\",\"status\":\"open\"}\n",
        "{\"id\":\"bd-1\",\"title\":\"Closed one\",\"status\":\"closed\",\"dependencies\":[{\"issue_id\":\"bd-1\",\"depends_on_id\":\"bd-epic\",\"dep_type\":\"parent-child\"}]}\n",
        "{\"id\":\"bd-2\",\"title\":\"Blocked one\",\"status\":\"open\",\"dependencies\":[{\"issue_id\":\"bd-2\",\"depends_on_id\":\"bd-1\",\"dep_type\":\"blocks\"}]}\n",
        "{\"id\":\"bd-3\",\"title\":\"Sibling\",\"status\":\"open\",\"dependencies\":[{\"issue_id\":\"bd-3\",\"depends_on_id\":\"bd-epic\",\"dep_type\":\"parent-child\"}]}\n",
        "{\"id\":\"bd-4\",\"title\":\"Both\",\"status\":\"open\",\"dependencies\":[{\"issue_id\":\"bd-4\",\"depends_on_id\":\"bd-1\",\"dep_type\":\"blocks\"},{\"issue_id\":\"bd-4\",\"depends_on_id\":\"bd-epic\",\"dep_type\":\"parent-child\"}]}\n",
    );

    fn item(bead: &str, workspace: &str, alias: &str) -> WorkItem {
        WorkItem {
            bead_id: bead.to_string(),
            workspace_id: workspace.to_string(),
            alias: alias.to_string(),
            human_name: alias.to_string(),
            title: String::new(),
        }
    }

    #[test]
    fn test_blocked_issue_surfaces_with_relation() {
        let graph = IssueGraph::from_jsonl(GRAPH);
        let in_flight = vec![item("bd-2", "ws-2", "fox")];
        let related = discover(&graph, "bd-1", &in_flight, "ws-self");
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].bead_id, "bd-2");
        assert_eq!(related[0].relation, "blocked by bd-1");
        assert_eq!(related[0].title, "Blocked one");
    }

    #[test]
    fn test_sibling_surfaces_with_epic_relation() {
        let graph = IssueGraph::from_jsonl(GRAPH);
        let in_flight = vec![item("bd-3", "ws-2", "fox")];
        let related = discover(&graph, "bd-1", &in_flight, "ws-self");
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].relation, "same parent epic");
    }

    #[test]
    fn test_blocked_relation_wins_over_sibling() {
        let graph = IssueGraph::from_jsonl(GRAPH);
        let in_flight = vec![item("bd-4", "ws-2", "fox")];
        let related = discover(&graph, "bd-1", &in_flight, "ws-self");
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].relation, "blocked by bd-1");
    }

    #[test]
    fn test_own_workspace_and_anonymous_entries_excluded() {
        let graph = IssueGraph::from_jsonl(GRAPH);
        let in_flight = vec![item("bd-2", "ws-self", "me"), item("bd-3", "", "")];
        let related = discover(&graph, "bd-1", &in_flight, "ws-self");
        assert!(related.is_empty());
    }

    #[test]
    fn test_not_in_flight_candidates_dropped() {
        let graph = IssueGraph::from_jsonl(GRAPH);
        let in_flight = vec![item("bd-99", "ws-2", "fox")];
        let related = discover(&graph, "bd-1", &in_flight, "ws-self");
        assert!(related.is_empty());
    }

    #[test]
    fn test_missing_export_is_silent() {
        let graph = IssueGraph::load(Path::new("/nonexistent/issues.jsonl"));
        let related = discover(&graph, "bd-1", &[item("bd-2", "ws-2", "fox")], "ws-self");
        assert!(related.is_empty());
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let graph = IssueGraph::from_jsonl("not json\n{\"id\":\"bd-1\"}\n");
        assert!(graph.get("bd-1").is_some());
        assert!(graph.get("not json").is_none());
    }
}
