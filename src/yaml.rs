//! Indentation-nested (YAML) documents.
//!
//! The original text is kept line by line and never re-emitted from a data
//! model, so everything the merge does not touch (comments, quoting, flow
//! values, blank lines) comes back byte for byte. Parsing builds an arena of
//! nodes over those lines: each node knows its key, its indentation, the
//! line range it spans and its children, addressed by index.
//!
//! Keys may be dotted at any level, so `http.port: 9090` under `quarkus:`
//! names `quarkus.http.port`. A top-level mapping keyed `"%<profile>"` holds
//! the entries scoped to that profile:
//!
//! ```yaml
//! quarkus:
//!   http:
//!     port: 9090
//! "%dev":
//!   quarkus:
//!     http:
//!       port: 8080
//! ```
//!
//! Insertion finds the deepest existing mapping along the requested path and
//! adds the remaining segments beneath it, one indentation level per
//! segment, after that mapping's last line.
//!
//! Only block mappings are walked. Sequences, block scalars and flow
//! collections are opaque values: they can be found but not descended into.

use yaml_rust2::{Yaml, YamlLoader};

use crate::error::PropfigError;
use crate::lines::{new_line_ending, split_terminated};
use crate::merge::ConfigDocument;
use crate::path::{ConfigKeyPath, common_prefix_length};
use crate::types::{PROFILE_PREFIX, PropertyEntry};

const DEFAULT_INDENT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Root,
    /// A key whose value is a block mapping.
    Mapping,
    /// A key with an inline value.
    Scalar,
    /// A key with no value. Becomes a mapping if a child is inserted.
    Empty,
    /// A key whose value is a sequence or a plain scalar starting on the
    /// next line.
    Opaque,
}

#[derive(Debug, Clone)]
struct Node {
    key: Option<ConfigKeyPath>,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    indent: usize,
    start: usize,
    /// Last non-blank line belonging to the node, inclusive.
    end: usize,
    value: String,
    profile: Option<String>,
}

impl Node {
    fn root() -> Self {
        Node {
            key: None,
            kind: NodeKind::Root,
            parent: None,
            children: Vec::new(),
            indent: 0,
            start: 0,
            end: 0,
            value: String::new(),
            profile: None,
        }
    }

    fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar | NodeKind::Opaque)
    }

    fn accepts_children(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping | NodeKind::Empty)
    }
}

/// A parsed YAML file.
#[derive(Debug, Clone)]
pub struct YamlDocument {
    lines: Vec<String>,
    /// Terminator of each line, parallel to `lines`.
    endings: Vec<&'static str>,
    new_line: &'static str,
    /// Line of the `...` document end marker, if any.
    document_end: Option<usize>,
    nodes: Vec<Node>,
    indent_width: usize,
}

impl YamlDocument {
    /// Parse `content`. `origin` names the file in errors.
    ///
    /// The text must load as YAML and its top level must be a block mapping
    /// (or empty).
    pub fn parse(origin: &str, content: &str) -> Result<Self, PropfigError> {
        check_loadable(origin, content)?;

        let (lines, endings) = split_terminated(content);
        let mut doc = YamlDocument {
            lines,
            new_line: new_line_ending(&endings),
            endings,
            document_end: None,
            nodes: vec![Node::root()],
            indent_width: DEFAULT_INDENT,
        };
        doc.build_tree(origin)?;
        doc.mark_profile_roots();
        doc.indent_width = doc.detect_indent_width();
        Ok(doc)
    }

    /// The inline value text stored for `(profile, path)`, if the entry
    /// exists and has one.
    pub fn value_of(&self, profile: Option<&str>, path: &ConfigKeyPath) -> Option<&str> {
        let start = self.scope_root(profile)?;
        let id = self.find(start, path.segments())?;
        Some(self.nodes[id.0].value.as_str())
    }

    /// Names of the profiles that have a top-level `"%profile"` mapping.
    pub fn profiles(&self) -> Vec<&str> {
        self.node(ROOT)
            .children
            .iter()
            .filter_map(|c| self.nodes[c.0].profile.as_deref())
            .collect()
    }

    /// Spaces per nesting level used for synthesized mappings.
    pub fn indent_width(&self) -> usize {
        self.indent_width
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn build_tree(&mut self, origin: &str) -> Result<(), PropfigError> {
        let parse_error = |line: usize, reason: &str| PropfigError::Parse {
            path: origin.to_string(),
            line: line + 1,
            reason: reason.to_string(),
        };

        // Open containers, innermost last. The root never closes.
        let mut stack: Vec<NodeId> = vec![ROOT];
        // A value node that absorbs more-indented lines.
        let mut continuation: Option<NodeId> = None;
        // Set when a sequence sits at the same indentation as its key.
        let mut compact_sequence = false;

        for i in 0..self.lines.len() {
            let line = self.lines[i].clone();
            let trimmed = line.trim_start_matches(' ');
            let indent = line.len() - trimmed.len();
            let content = trimmed.trim_end();
            if content.is_empty() {
                continue;
            }

            if let Some(c) = continuation {
                let owner = &self.nodes[c.0];
                let same_level_item = compact_sequence
                    && indent == owner.indent
                    && is_sequence_item(content);
                if indent > owner.indent || same_level_item {
                    self.extend(c, i);
                    continue;
                }
                continuation = None;
                compact_sequence = false;
            }

            if is_document_end(content) {
                self.document_end.get_or_insert(i);
                continue;
            }
            if content.starts_with('#') || is_stream_marker(content) {
                continue;
            }
            if trimmed.starts_with('\t') {
                return Err(parse_error(i, "tab in indentation"));
            }

            // An empty-valued key learns what it holds from the next line.
            let top = *stack.last().unwrap_or(&ROOT);
            if self.nodes[top.0].kind == NodeKind::Empty {
                let top_indent = self.nodes[top.0].indent;
                let deeper = indent > top_indent;
                let same_level_item = indent == top_indent && is_sequence_item(content);
                if (deeper && (is_sequence_item(content) || split_key(content).is_none()))
                    || same_level_item
                {
                    self.nodes[top.0].kind = NodeKind::Opaque;
                    self.extend(top, i);
                    stack.pop();
                    continuation = Some(top);
                    compact_sequence = same_level_item;
                    continue;
                }
                if deeper {
                    self.nodes[top.0].kind = NodeKind::Mapping;
                }
            }

            while stack.len() > 1 {
                let top = *stack.last().unwrap_or(&ROOT);
                if indent > self.nodes[top.0].indent {
                    break;
                }
                stack.pop();
            }
            let parent = *stack.last().unwrap_or(&ROOT);

            if let Some(first) = self.nodes[parent.0].children.first()
                && self.nodes[first.0].indent != indent
            {
                return Err(parse_error(i, "inconsistent indentation"));
            }
            if is_sequence_item(content) {
                return Err(parse_error(i, "sequence item where a mapping key was expected"));
            }
            if content == "?" || content.starts_with("? ") {
                return Err(parse_error(i, "complex mapping keys are not supported"));
            }
            let Some((raw_key, raw_value)) = split_key(content) else {
                return Err(parse_error(i, "expected 'key: value'"));
            };
            let key = ConfigKeyPath::parse(&unquote(raw_key))
                .map_err(|_| parse_error(i, &format!("malformed key '{raw_key}'")))?;

            let kind = if is_empty_value(raw_value) {
                NodeKind::Empty
            } else {
                NodeKind::Scalar
            };
            let id = self.push_node(Node {
                key: Some(key),
                kind,
                parent: Some(parent),
                children: Vec::new(),
                indent,
                start: i,
                end: i,
                value: raw_value.to_string(),
                profile: None,
            });
            self.extend(id, i);

            match kind {
                NodeKind::Empty => stack.push(id),
                _ => continuation = Some(id),
            }
        }
        Ok(())
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        if let Some(parent) = node.parent {
            self.nodes[parent.0].children.push(id);
        }
        self.nodes.push(node);
        id
    }

    /// Grow `id` and its ancestors so they span line `line`.
    fn extend(&mut self, id: NodeId, line: usize) {
        let mut current = Some(id);
        while let Some(n) = current {
            if n == ROOT {
                break;
            }
            let node = &mut self.nodes[n.0];
            node.end = node.end.max(line);
            current = node.parent;
        }
    }

    fn mark_profile_roots(&mut self) {
        let top_level = self.nodes[ROOT.0].children.clone();
        for id in top_level {
            let node = &mut self.nodes[id.0];
            if !node.accepts_children() {
                continue;
            }
            let profile = match node.key.as_ref().map(ConfigKeyPath::segments) {
                Some([only]) => only.strip_prefix(PROFILE_PREFIX).filter(|p| !p.is_empty()),
                _ => None,
            };
            node.profile = profile.map(str::to_string);
        }
    }

    fn detect_indent_width(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Mapping)
            .find_map(|n| {
                let first = n.children.first()?;
                self.nodes[first.0].indent.checked_sub(n.indent)
            })
            .filter(|w| *w > 0)
            .unwrap_or(DEFAULT_INDENT)
    }

    fn profile_root(&self, profile: &str) -> Option<NodeId> {
        self.node(ROOT)
            .children
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].profile.as_deref() == Some(profile))
    }

    /// Where lookups for `profile` start, if that scope exists.
    fn scope_root(&self, profile: Option<&str>) -> Option<NodeId> {
        match profile {
            None => Some(ROOT),
            Some(p) => self.profile_root(p),
        }
    }

    /// Descend from `node` consuming key segments; `None` if nothing sits at
    /// exactly `remaining`.
    fn find(&self, node: NodeId, remaining: &[String]) -> Option<NodeId> {
        for &child in &self.node(node).children {
            let c = self.node(child);
            if node == ROOT && c.profile.is_some() {
                continue;
            }
            let Some(key) = &c.key else { continue };
            let k = key.segments();
            if common_prefix_length(k, remaining) != k.len() {
                continue;
            }
            if k.len() == remaining.len() {
                return Some(child);
            }
            if c.kind == NodeKind::Mapping
                && let Some(found) = self.find(child, &remaining[k.len()..])
            {
                return Some(found);
            }
        }
        None
    }

    /// The deepest node along `remaining` that can take children, with the
    /// number of segments consumed to reach it.
    fn deepest_container(&self, node: NodeId, remaining: &[String], consumed: usize) -> (NodeId, usize) {
        let mut best = (node, consumed);
        for &child in &self.node(node).children {
            let c = self.node(child);
            if !c.accepts_children() || (node == ROOT && c.profile.is_some()) {
                continue;
            }
            let Some(key) = &c.key else { continue };
            let k = key.segments();
            if k.len() < remaining.len() && common_prefix_length(k, remaining) == k.len() {
                let candidate = self.deepest_container(child, &remaining[k.len()..], consumed + k.len());
                if candidate.1 > best.1 {
                    best = candidate;
                }
            }
        }
        best
    }

    /// Reject an insertion that would need to nest under an existing value.
    fn check_not_blocked(
        &self,
        container: NodeId,
        path: &ConfigKeyPath,
        consumed: usize,
    ) -> Result<(), PropfigError> {
        let remaining = &path.segments()[consumed..];
        for &child in &self.node(container).children {
            let c = self.node(child);
            let Some(key) = &c.key else { continue };
            let k = key.segments();
            if c.is_leaf() && k.len() < remaining.len() && common_prefix_length(k, remaining) == k.len() {
                let mut blocking: Vec<&str> = path.segments()[..consumed].iter().map(String::as_str).collect();
                blocking.extend(k.iter().map(String::as_str));
                return Err(PropfigError::ScalarConflict {
                    key: path.dotted(),
                    blocking: blocking.join("."),
                });
            }
        }
        Ok(())
    }

    /// Indentation for a new direct child of `container`.
    fn child_indent(&self, container: NodeId) -> usize {
        let node = self.node(container);
        match node.children.first() {
            Some(first) => self.nodes[first.0].indent,
            None if container == ROOT => 0,
            None => node.indent + self.indent_width,
        }
    }

    /// Where top-level content goes: before a `...` marker, else at the end.
    fn top_level_end(&self) -> usize {
        self.document_end.unwrap_or(self.lines.len())
    }

    /// Splice `new_lines` in before line `at`, shifting every node below.
    fn insert_lines(&mut self, at: usize, new_lines: Vec<String>) {
        let n = new_lines.len();
        for node in self.nodes.iter_mut().skip(1) {
            if node.start >= at {
                node.start += n;
            }
            if node.end >= at {
                node.end += n;
            }
        }
        if let Some(end) = self.document_end.as_mut()
            && *end >= at
        {
            *end += n;
        }
        if at == self.lines.len()
            && let Some(last) = self.endings.last_mut()
            && last.is_empty()
        {
            *last = self.new_line;
        }
        self.lines.splice(at..at, new_lines);
        self.endings.splice(at..at, std::iter::repeat_n(self.new_line, n));
    }

    /// Reject creating a `"%profile":` root when the key already holds a
    /// value that is not a mapping.
    fn check_profile_key_free(&self, profile: &str, path: &ConfigKeyPath) -> Result<(), PropfigError> {
        let root_key = format!("{PROFILE_PREFIX}{profile}");
        for &child in &self.node(ROOT).children {
            let c = self.node(child);
            if c.is_leaf()
                && let Some(key) = &c.key
                && key.segments() == [root_key.as_str()]
            {
                return Err(PropfigError::ScalarConflict {
                    key: path.dotted(),
                    blocking: root_key,
                });
            }
        }
        Ok(())
    }

    /// Append an empty top-level `"%profile":` mapping.
    fn create_profile_root(&mut self, profile: &str) -> NodeId {
        let at = self.top_level_end();
        let indent = self.child_indent(ROOT);
        let key = format!("{PROFILE_PREFIX}{profile}");
        self.insert_lines(at, vec![format!("{}{}:", " ".repeat(indent), yaml_key(&key))]);
        tracing::trace!(profile, "created profile root");
        self.push_node(Node {
            key: ConfigKeyPath::parse(&key).ok(),
            kind: NodeKind::Empty,
            parent: Some(ROOT),
            children: Vec::new(),
            indent,
            start: at,
            end: at,
            value: String::new(),
            profile: Some(profile.to_string()),
        })
    }
}

impl ConfigDocument for YamlDocument {
    fn contains(&self, profile: Option<&str>, path: &ConfigKeyPath) -> bool {
        self.scope_root(profile)
            .and_then(|start| self.find(start, path.segments()))
            .is_some()
    }

    fn insert(&mut self, entry: &PropertyEntry) -> Result<(), PropfigError> {
        let path = &entry.path;
        let existing_scope = self.scope_root(entry.profile.as_deref());

        let (container, consumed) = match existing_scope {
            Some(scope) => {
                let (container, consumed) = self.deepest_container(scope, path.segments(), 0);
                self.check_not_blocked(container, path, consumed)?;
                (container, consumed)
            }
            None => {
                let profile = entry.profile.as_deref().unwrap_or_default();
                self.check_profile_key_free(profile, path)?;
                (self.create_profile_root(profile), 0)
            }
        };

        let Some(suffix) = path.suffix_from(consumed) else {
            return Ok(());
        };
        let at = if container == ROOT {
            self.top_level_end()
        } else {
            self.node(container).end + 1
        };
        let base = self.child_indent(container);
        let width = self.indent_width;
        let depth = suffix.len() - 1;
        let leaf_indent = " ".repeat(base + depth * width);

        let mut new_lines = Vec::new();
        for (level, segment) in suffix.segments()[..depth].iter().enumerate() {
            new_lines.push(format!("{}{}:", " ".repeat(base + level * width), yaml_key(segment)));
        }
        if let Some(comment) = &entry.comment {
            new_lines.extend(comment.lines().map(|c| format!("{leaf_indent}# {c}")));
        }
        let value = yaml_scalar(&entry.value);
        new_lines.push(format!("{leaf_indent}{}: {value}", yaml_key(suffix.leaf())));
        let last = at + new_lines.len() - 1;
        self.insert_lines(at, new_lines);

        if self.node(container).kind == NodeKind::Empty {
            self.nodes[container.0].kind = NodeKind::Mapping;
        }
        let mut parent = container;
        for (level, segment) in suffix.segments().iter().enumerate() {
            let is_leaf = level == depth;
            let start = if is_leaf { last } else { at + level };
            parent = self.push_node(Node {
                key: ConfigKeyPath::parse(segment).ok(),
                kind: if is_leaf { NodeKind::Scalar } else { NodeKind::Mapping },
                parent: Some(parent),
                children: Vec::new(),
                indent: base + level * width,
                start,
                end: last,
                value: if is_leaf { value.clone() } else { String::new() },
                profile: None,
            });
        }
        self.extend(parent, last);
        Ok(())
    }

    fn render(&self) -> String {
        self.lines
            .iter()
            .zip(&self.endings)
            .flat_map(|(line, ending)| [line.as_str(), ending])
            .collect()
    }
}

/// Run the text through a YAML loader before editing it structurally.
fn check_loadable(origin: &str, content: &str) -> Result<(), PropfigError> {
    let docs = YamlLoader::load_from_str(content).map_err(|e| PropfigError::Yaml {
        path: origin.to_string(),
        reason: e.to_string(),
    })?;
    let reject = |reason: &str| PropfigError::Yaml {
        path: origin.to_string(),
        reason: reason.to_string(),
    };
    match docs.as_slice() {
        [] | [Yaml::Hash(_)] | [Yaml::Null] => Ok(()),
        [_] => Err(reject("top-level value is not a mapping")),
        _ => Err(reject("multi-document streams are not supported")),
    }
}

fn is_sequence_item(content: &str) -> bool {
    content == "-" || content.starts_with("- ")
}

fn is_stream_marker(content: &str) -> bool {
    content == "---"
        || content.starts_with("--- ")
        || content.starts_with("%YAML")
        || content.starts_with("%TAG")
}

fn is_document_end(content: &str) -> bool {
    content == "..." || content.starts_with("... ")
}

/// Plain scalars a YAML 1.1 or 1.2 loader reads as null or a boolean.
const RESERVED_PLAIN: &[&str] = &["~", "null", "true", "false", "yes", "no", "on", "off", "y", "n"];

/// Whether an inline value leaves the key's content to following lines:
/// nothing, a comment, or only an anchor and/or tag.
fn is_empty_value(raw: &str) -> bool {
    raw.split_whitespace()
        .take_while(|token| !token.starts_with('#'))
        .all(|token| token.starts_with('&') || token.starts_with('!'))
}

/// Split `key: value` into raw key and trimmed raw value.
fn split_key(content: &str) -> Option<(&str, &str)> {
    let key_end = match content.chars().next()? {
        quote @ ('"' | '\'') => {
            let close = closing_quote(content, quote)?;
            let after = content[close + 1..].trim_start_matches(' ');
            if !after.starts_with(':') {
                return None;
            }
            close + 1
        }
        _ => {
            let bytes = content.as_bytes();
            let mut found = None;
            for (i, b) in bytes.iter().enumerate() {
                if *b == b'#' && i > 0 && bytes[i - 1] == b' ' {
                    return None;
                }
                if *b == b':' && (i + 1 == bytes.len() || bytes[i + 1] == b' ') {
                    found = Some(i);
                    break;
                }
            }
            found?
        }
    };
    let key = content[..key_end].trim_end();
    let colon = key_end + content[key_end..].find(':')?;
    Some((key, content[colon + 1..].trim()))
}

/// Byte index of the quote closing the one at index 0.
fn closing_quote(content: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    let mut chars = content.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if quote == '"' {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                return Some(i);
            }
        } else if c == '\'' {
            if chars.peek().map(|(_, n)| *n) == Some('\'') {
                chars.next();
            } else {
                return Some(i);
            }
        }
    }
    None
}

fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let inner = &raw[1..raw.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => {}
            }
        }
        return out;
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].replace("''", "'");
    }
    raw.to_string()
}

fn needs_quotes(s: &str) -> bool {
    let Some(first) = s.chars().next() else {
        return true;
    };
    let second = s.chars().nth(1);
    first.is_whitespace()
        || s.ends_with(char::is_whitespace)
        || ",[]{}#&*!|>'\"%@`".contains(first)
        || ("-?:".contains(first) && matches!(second, None | Some(' ')))
        || s.contains(": ")
        || s.contains(" #")
        || s.ends_with(':')
        || s.chars().any(char::is_control)
        || RESERVED_PLAIN.iter().any(|r| s.eq_ignore_ascii_case(r))
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a mapping key, quoting it when plain style would be ambiguous.
pub fn yaml_key(key: &str) -> String {
    if needs_quotes(key) {
        double_quoted(key)
    } else {
        key.to_string()
    }
}

/// Render a scalar value, quoting it when plain style would be ambiguous.
pub fn yaml_scalar(value: &str) -> String {
    yaml_key(value)
}
