//! File tree reconstruction for container items.
//!
//! The service returns the contents of an archive as a flat, paginated list
//! of entries that point at their parent. [`TreeReconstructor`] pages
//! through the listing and [`build_forest`] folds it into nested branches.

use crate::error::Result;
use crate::transport::{ApiClient, ApiRequest};
use crate::types::empty_as_none;
use intelx_core::FileFormat;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Endpoint serving tree listings.
const TREE_PATH: &str = "/file/view";

/// Hard stop for listings whose pagination never signals completion.
const MAX_TREE_PAGES: usize = 1000;

/// One entry of a flat tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Item id of the entry
    pub systemid: String,
    /// File or folder name
    #[serde(default)]
    pub name: String,
    /// Id of the containing entry; a reference, not ownership
    #[serde(
        default,
        rename = "parentid",
        alias = "parentId",
        alias = "parent",
        deserialize_with = "empty_as_none"
    )]
    pub parent_id: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Whether the entry is a folder
    #[serde(default, rename = "isfolder", alias = "isFolder")]
    pub is_folder: bool,
}

/// A node together with the entries it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBranch {
    /// The entry itself
    pub node: TreeNode,
    /// Contained entries, in listing order
    pub children: Vec<TreeBranch>,
}

impl TreeBranch {
    /// Number of entries in this branch, itself included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(branch) = pending.pop() {
            count += 1;
            pending.extend(&branch.children);
        }
        count
    }

    /// Depth-first walk over every node in the branch, in listing order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TreeNode, usize)) {
        let mut pending = vec![(self, 0)];
        while let Some((branch, depth)) = pending.pop() {
            visit(&branch.node, depth);
            pending.extend(branch.children.iter().rev().map(|child| (child, depth + 1)));
        }
    }
}

// Listings are remote input and may nest arbitrarily deep.
impl Drop for TreeBranch {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut branch) = pending.pop() {
            pending.append(&mut branch.children);
        }
    }
}

/// Fetches tree listings and assembles them.
#[derive(Clone)]
pub struct TreeReconstructor {
    api: ApiClient,
    page_size: u32,
}

impl TreeReconstructor {
    /// Create a reconstructor requesting `page_size` entries per call.
    #[must_use]
    pub fn new(api: ApiClient, page_size: u32) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
        }
    }

    /// Fetch the whole flat listing for an index file.
    ///
    /// Pages are requested at an offset equal to the entries already held;
    /// an empty or short page ends the listing.
    pub async fn fetch_listing(&self, bucket: &str, indexfile: &str) -> Result<Vec<TreeNode>> {
        let mut nodes: Vec<TreeNode> = Vec::new();
        let mut seen = HashSet::new();

        for page_number in 0..MAX_TREE_PAGES {
            let call = ApiRequest::get(TREE_PATH)
                .param("f", FileFormat::TreeViewJson.code())
                .param("storageid", indexfile)
                .param("bucket", bucket)
                .param("offset", nodes.len())
                .param("limit", self.page_size);

            let page: Option<Vec<TreeNode>> = self.api.json(&call).await?;
            let page = page.unwrap_or_default();
            let received = page.len();

            let before = nodes.len();
            for node in page {
                if seen.insert(node.systemid.clone()) {
                    nodes.push(node);
                }
            }
            let added = nodes.len() - before;

            tracing::debug!(bucket, indexfile, page_number, received, added, "Tree page fetched");

            if received < self.page_size as usize {
                return Ok(nodes);
            }
            if added == 0 {
                tracing::warn!(bucket, indexfile, "Tree listing repeated itself, stopping");
                return Ok(nodes);
            }
        }

        tracing::warn!(
            bucket,
            indexfile,
            entries = nodes.len(),
            "Tree listing exceeded page limit, returning what was fetched"
        );
        Ok(nodes)
    }

    /// Fetch a listing and assemble it into a forest.
    pub async fn fetch(&self, bucket: &str, indexfile: &str) -> Result<Vec<TreeBranch>> {
        let nodes = self.fetch_listing(bucket, indexfile).await?;
        Ok(build_forest(nodes))
    }
}

/// Assemble a flat listing into a forest.
///
/// Nodes whose parent is missing from the listing (or is the node itself)
/// become roots. Later entries repeating a `systemid` are dropped. Parent
/// cycles are broken by promoting the first unvisited node of the cycle.
/// Roots and children keep listing order.
#[must_use]
pub fn build_forest(nodes: Vec<TreeNode>) -> Vec<TreeBranch> {
    let mut unique = Vec::with_capacity(nodes.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        if !index.contains_key(&node.systemid) {
            index.insert(node.systemid.clone(), unique.len());
            unique.push(node);
        }
    }

    let mut roots = Vec::new();
    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    for (position, node) in unique.iter().enumerate() {
        let parent = node
            .parent_id
            .as_deref()
            .filter(|parent| *parent != node.systemid)
            .and_then(|parent| index.get(parent).copied());
        match parent {
            Some(parent) => children.entry(parent).or_default().push(position),
            None => roots.push(position),
        }
    }

    let mut slots: Vec<Option<TreeNode>> = unique.into_iter().map(Some).collect();
    let mut forest: Vec<TreeBranch> = roots
        .into_iter()
        .filter_map(|root| assemble(root, &mut slots, &children))
        .collect();

    // Whatever is left hangs off a parent cycle.
    for position in 0..slots.len() {
        if slots[position].is_some() {
            if let Some(branch) = assemble(position, &mut slots, &children) {
                forest.push(branch);
            }
        }
    }

    forest
}

/// A branch under construction.
struct Frame {
    position: usize,
    node: TreeNode,
    next_child: usize,
    children: Vec<TreeBranch>,
}

/// Build the branch rooted at `position`, depth first with an explicit stack.
/// Nodes already taken by another branch are skipped.
fn assemble(
    position: usize,
    slots: &mut [Option<TreeNode>],
    children: &HashMap<usize, Vec<usize>>,
) -> Option<TreeBranch> {
    let node = slots[position].take()?;
    let mut stack = vec![Frame {
        position,
        node,
        next_child: 0,
        children: Vec::new(),
    }];

    while let Some(top) = stack.last_mut() {
        let kids = children.get(&top.position).map_or(&[][..], Vec::as_slice);
        if let Some(&kid) = kids.get(top.next_child) {
            top.next_child += 1;
            if let Some(node) = slots[kid].take() {
                stack.push(Frame {
                    position: kid,
                    node,
                    next_child: 0,
                    children: Vec::new(),
                });
            }
            continue;
        }

        let frame = stack.pop()?;
        let branch = TreeBranch {
            node: frame.node,
            children: frame.children,
        };
        match stack.last_mut() {
            Some(parent) => parent.children.push(branch),
            None => return Some(branch),
        }
    }
    None
}
