//! Field prefetch plumbing for context iteration.
//!
//! A set can be tagged with prefetch fields (ex. `"text"`). When its
//! contexts are iterated, the base stream is piped through the pipeline
//! registered for each tag, in sorted tag order, so expensive per-commit
//! data is fetched in batches instead of one lookup per commit.

use crate::error::Error;
use crate::id::is_virtual;
use crate::id::Hash20;
use crate::id::HexDebug;
use crate::id::RevId;
use crate::id::NULL_HASH;
use crate::id::NULL_ID;
use crate::id::WDIR_HASH;
use crate::repo::Repo;
use crate::set::RevIter;
use crate::Result;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::RwLock;

/// Commit contexts are prefetched in batches of this many.
const TEXT_BATCH: usize = 10000;

/// A commit context yielded by context iteration. Pipelines fill in
/// the optional fields.
#[derive(Clone)]
pub struct CommitCtx {
    /// Revision id.
    pub rev: RevId,
    /// Commit hash. Virtual revisions map to the well-known virtual
    /// hashes.
    pub hash: Hash20,
    /// Raw commit text, populated by the `"text"` pipeline.
    pub text: Option<Vec<u8>>,
}

impl fmt::Debug for CommitCtx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CommitCtx")
            .field("rev", &self.rev)
            .field("hash", &HexDebug(&self.hash))
            .field("text", &self.text.as_ref().map(|t| t.len()))
            .finish()
    }
}

/// Iterator over commit contexts.
pub type CtxIter = Box<dyn Iterator<Item = Result<CommitCtx>> + Send>;

/// A prefetch pipeline: consumes a context stream, returns the same
/// stream with one field populated.
pub type Pipeline = Arc<dyn Fn(&Repo, CtxIter) -> CtxIter + Send + Sync>;

/// Prefetch tables owned by the services bundle, so multiple logical
/// repositories can coexist without shared global state.
pub struct PrefetchRegistry {
    pipelines: RwLock<HashMap<String, Pipeline>>,
    template_fields: RwLock<HashMap<String, Vec<String>>>,
}

impl PrefetchRegistry {
    /// Registry pre-populated with the built-in `"text"` pipeline and
    /// the template symbols that need it.
    pub(crate) fn with_builtins() -> Self {
        let registry = PrefetchRegistry {
            pipelines: Default::default(),
            template_fields: Default::default(),
        };
        registry.register("text", Arc::new(text_pipeline));
        // Template keywords rendered from the raw commit text. The
        // empty symbol covers the default template.
        for symbol in &[
            "author",
            "date",
            "desc",
            "extras",
            "file_adds",
            "file_copies",
            "file_copies_switch",
            "file_dels",
            "file_mods",
            "files",
            "filestat",
            "manifest",
            "",
        ] {
            registry.register_template_symbol(symbol, &["text"]);
        }
        registry
    }

    /// Register (or replace) the pipeline for a prefetch field.
    pub fn register(&self, field: impl Into<String>, pipeline: Pipeline) {
        self.pipelines
            .write()
            .unwrap()
            .insert(field.into(), pipeline);
    }

    /// Declare which prefetch fields a template symbol needs.
    pub fn register_template_symbol(&self, symbol: &str, fields: &[&str]) {
        self.template_fields
            .write()
            .unwrap()
            .insert(symbol.to_string(), fields.iter().map(|f| f.to_string()).collect());
    }

    /// Prefetch fields needed to render the given template symbol.
    pub fn fields_for_template_symbol(&self, symbol: &str) -> Vec<String> {
        self.template_fields
            .read()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }

    /// Pipe `stream` through the pipeline of every field, in sorted
    /// field order. An unregistered field is a programming error.
    pub(crate) fn apply(
        &self,
        repo: &Repo,
        fields: &BTreeSet<String>,
        mut stream: CtxIter,
    ) -> Result<CtxIter> {
        for field in fields {
            let pipeline = self
                .pipelines
                .read()
                .unwrap()
                .get(field)
                .cloned()
                .ok_or_else(|| Error::UnknownPrefetchField(field.clone()))?;
            stream = pipeline(repo, stream);
        }
        Ok(stream)
    }
}

/// Base context stream for a rev iteration, without any prefetch.
pub(crate) fn ctx_stream(repo: Repo, revs: RevIter) -> CtxIter {
    let iter = revs.map(move |rev| {
        let rev = rev?;
        let hash = if rev == NULL_ID {
            NULL_HASH
        } else if is_virtual(rev) {
            WDIR_HASH
        } else {
            repo.idmap().id_to_hash(rev)?
        };
        Ok(CommitCtx {
            rev,
            hash,
            text: None,
        })
    });
    Box::new(iter)
}

/// The built-in `"text"` pipeline: batch up contexts, fetch their raw
/// text from the text source, yield them with `text` populated.
fn text_pipeline(repo: &Repo, stream: CtxIter) -> CtxIter {
    Box::new(TextBatchIter {
        repo: repo.clone(),
        input: Some(stream),
        buffered: VecDeque::new(),
    })
}

struct TextBatchIter {
    repo: Repo,
    input: Option<CtxIter>,
    buffered: VecDeque<Result<CommitCtx>>,
}

impl TextBatchIter {
    fn fill(&mut self) {
        let input = match self.input.as_mut() {
            Some(input) => input,
            None => return,
        };
        let mut batch: Vec<CommitCtx> = Vec::new();
        let mut tail: Option<Result<CommitCtx>> = None;
        while batch.len() < TEXT_BATCH {
            match input.next() {
                Some(Ok(ctx)) => batch.push(ctx),
                Some(Err(e)) => {
                    tail = Some(Err(e));
                    break;
                }
                None => {
                    self.input = None;
                    break;
                }
            }
        }
        if !batch.is_empty() {
            let hashes: Vec<Hash20> = batch.iter().map(|c| c.hash).collect();
            match self.repo.texts().read_texts(&hashes) {
                Ok(texts) => {
                    for (mut ctx, text) in batch.into_iter().zip(texts) {
                        ctx.text = Some(text);
                        self.buffered.push_back(Ok(ctx));
                    }
                }
                Err(e) => self.buffered.push_back(Err(e)),
            }
        }
        if let Some(err) = tail {
            self.buffered.push_back(err);
        }
    }
}

impl Iterator for TextBatchIter {
    type Item = Result<CommitCtx>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffered.is_empty() {
            self.fill();
        }
        self.buffered.pop_front()
    }
}
