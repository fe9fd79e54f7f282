//! Sources
//!
//! A [`Source`] is anything a node can be produced from. The classifier maps
//! every source onto exactly one [`SourceKind`]:
//!
//! | Kind | Becomes |
//! |------|---------|
//! | `Function` | invoked once with `(options, child)`, the result is constructed again |
//! | `Future` | awaited once, the result is constructed again |
//! | `Node` | returned unchanged (options and children may be merged in) |
//! | `Marshalled` | unmarshalled into a live node |
//! | `Scalar` | a leaf node whose source is the scalar |
//! | `Generator` | a fragment whose children are one generation per pulled value |
//! | `Iterable` / `Stream` | a fragment whose children are the constructed elements |
//! | `Empty` / `Itself` | an empty fragment |
//!
//! Plain data ([`Source::Data`]) is normalised into one of the kinds above
//! before classification; a JSON object that is not a marshalled node is a
//! classification failure.

mod generator;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use futures_util::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::marshal::MarshalledNode;
use crate::node::{Options, SourceReference, Symbol, VNode};

pub use generator::{Generator, GeneratorDriver, GeneratorHandle, IterGenerator, StreamGenerator};

/// An awaitable source, resolved once and shared by every consumer.
pub type SourceFuture = Shared<BoxFuture<'static, Result<Source>>>;

/// A function source: called with the node options and the optional child
/// fragment, returning a replacement source.
#[derive(Clone)]
pub struct SourceFn {
    f: Arc<dyn Fn(&Options, Option<&VNode>) -> Result<Source> + Send + Sync>,
}

impl SourceFn {
    /// Wrap a function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Options, Option<&VNode>) -> Result<Source> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Invoke the function.
    pub fn call(&self, options: &Options, child: Option<&VNode>) -> Result<Source> {
        (self.f)(options, child)
    }

    /// Whether both handles wrap the same function.
    pub fn ptr_eq(&self, other: &SourceFn) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }
}

/// A replayable asynchronous collection of sources.
#[derive(Clone)]
pub struct SourceStream {
    factory: Arc<dyn Fn() -> BoxStream<'static, Result<Source>> + Send + Sync>,
}

impl SourceStream {
    /// Wrap a stream factory.
    pub fn new<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Source>> + Send + 'static,
    {
        Self {
            factory: Arc::new(move || factory().boxed()),
        }
    }

    /// Start a fresh run.
    pub fn stream(&self) -> BoxStream<'static, Result<Source>> {
        (self.factory)()
    }
}

/// Which of the recognised kinds a source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Nothing; an empty placeholder.
    Empty,
    /// The self-terminating marker returned by a function that has nothing
    /// further to produce.
    Itself,
    /// A function to invoke.
    Function,
    /// A value to await.
    Future,
    /// An existing node.
    Node,
    /// A marshalled node to expand.
    Marshalled,
    /// A terminal scalar.
    Scalar,
    /// A manually pulled generator.
    Generator,
    /// A fixed collection.
    Iterable,
    /// An asynchronous collection.
    Stream,
}

/// Anything a node can be produced from.
#[derive(Clone, Default)]
pub enum Source {
    /// Nothing.
    #[default]
    Empty,
    /// Self-terminating marker: construction stops here without a new node.
    Itself,
    /// A string, number, boolean or symbol.
    Scalar(SourceReference),
    /// An already constructed node.
    Node(VNode),
    /// Inert plain data, normalised during classification.
    Data(Value),
    /// A marshalled node.
    Marshalled(Arc<MarshalledNode>),
    /// A function producing a replacement source.
    Function(SourceFn),
    /// An awaitable producing a replacement source.
    Future(SourceFuture),
    /// A fixed collection of sources.
    Iterable(Arc<[Source]>),
    /// An asynchronous collection of sources.
    Stream(SourceStream),
    /// A manually pulled generator of sources.
    Generator(GeneratorHandle),
}

impl Source {
    /// A function source.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Options, Option<&VNode>) -> Result<Source> + Send + Sync + 'static,
    {
        Self::Function(SourceFn::new(f))
    }

    /// An awaitable source.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Source>> + Send + 'static,
    {
        Self::Future(future.boxed().shared())
    }

    /// A source that fails with `error` when resolved.
    pub fn error(error: Error) -> Self {
        Self::future(async move { Err(error) })
    }

    /// An asynchronous collection, replayed from `factory`.
    pub fn stream<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Source>> + Send + 'static,
    {
        Self::Stream(SourceStream::new(factory))
    }

    /// A manually pulled generator.
    pub fn generator<G>(generator: G) -> Self
    where
        G: Generator + 'static,
    {
        Self::Generator(GeneratorHandle::new(generator))
    }

    /// A generator pulling from a stream.
    pub fn generator_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Source>> + Send + 'static,
    {
        Self::generator(StreamGenerator::new(stream))
    }

    /// A fixed collection.
    pub fn iter<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Source>,
    {
        Self::Iterable(items.into_iter().map(Into::into).collect())
    }

    /// A fresh unique symbol scalar.
    pub fn symbol(description: &str) -> Self {
        Self::Scalar(SourceReference::Symbol(Symbol::new(description)))
    }

    /// Normalise plain data into a classifiable source.
    pub fn normalize(self) -> Result<Source> {
        match self {
            Source::Data(value) => from_data(value),
            other => Ok(other),
        }
    }

    /// Classify a source. Plain data is normalised on the fly and may fail.
    pub fn kind(&self) -> Result<SourceKind> {
        Ok(match self {
            Source::Empty => SourceKind::Empty,
            Source::Itself => SourceKind::Itself,
            Source::Scalar(_) => SourceKind::Scalar,
            Source::Node(_) => SourceKind::Node,
            Source::Marshalled(_) => SourceKind::Marshalled,
            Source::Function(_) => SourceKind::Function,
            Source::Future(_) => SourceKind::Future,
            Source::Iterable(_) => SourceKind::Iterable,
            Source::Stream(_) => SourceKind::Stream,
            Source::Generator(_) => SourceKind::Generator,
            Source::Data(value) => return from_data(value.clone())?.kind(),
        })
    }

    /// The scalar value, if this is a scalar source.
    pub fn as_scalar(&self) -> Option<&SourceReference> {
        match self {
            Source::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// The node, if this is a node source.
    pub fn as_node(&self) -> Option<&VNode> {
        match self {
            Source::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Whether this is the empty source.
    pub fn is_empty(&self) -> bool {
        matches!(self, Source::Empty)
    }
}

fn from_data(value: Value) -> Result<Source> {
    match value {
        Value::Null => Ok(Source::Empty),
        Value::Bool(value) => Ok(Source::Scalar(value.into())),
        Value::Number(number) => number
            .as_f64()
            .map(|value| Source::Scalar(value.into()))
            .ok_or_else(|| Error::Classification(format!("unrepresentable number {number}"))),
        Value::String(value) => Ok(Source::Scalar(value.into())),
        Value::Array(items) => Ok(Source::Iterable(items.into_iter().map(Source::Data).collect())),
        Value::Object(map) if map.contains_key("reference") => {
            serde_json::from_value::<MarshalledNode>(Value::Object(map))
                .map(|node| Source::Marshalled(Arc::new(node)))
                .map_err(|error| Error::Classification(format!("malformed marshalled node: {error}")))
        }
        Value::Object(map) => Err(Error::Classification(format!(
            "object with keys {:?}",
            map.keys().collect::<Vec<_>>()
        ))),
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Empty => f.write_str("Empty"),
            Source::Itself => f.write_str("Itself"),
            Source::Scalar(value) => write!(f, "Scalar({value})"),
            Source::Node(node) => write!(f, "Node({})", node.reference()),
            Source::Data(value) => write!(f, "Data({value})"),
            Source::Marshalled(node) => write!(f, "Marshalled({:?})", node.reference),
            Source::Function(_) => f.write_str("Function"),
            Source::Future(_) => f.write_str("Future"),
            Source::Iterable(items) => f.debug_tuple("Iterable").field(&items.len()).finish(),
            Source::Stream(_) => f.write_str("Stream"),
            Source::Generator(handle) => write!(f, "{handle:?}"),
        }
    }
}

impl From<SourceReference> for Source {
    fn from(value: SourceReference) -> Self {
        Source::Scalar(value)
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        Source::Scalar(value.into())
    }
}

impl From<String> for Source {
    fn from(value: String) -> Self {
        Source::Scalar(value.into())
    }
}

impl From<f64> for Source {
    fn from(value: f64) -> Self {
        Source::Scalar(value.into())
    }
}

impl From<i32> for Source {
    fn from(value: i32) -> Self {
        Source::Scalar(value.into())
    }
}

impl From<bool> for Source {
    fn from(value: bool) -> Self {
        Source::Scalar(value.into())
    }
}

impl From<Symbol> for Source {
    fn from(value: Symbol) -> Self {
        Source::Scalar(value.into())
    }
}

impl From<VNode> for Source {
    fn from(node: VNode) -> Self {
        Source::Node(node)
    }
}

impl From<Value> for Source {
    fn from(value: Value) -> Self {
        Source::Data(value)
    }
}

impl From<MarshalledNode> for Source {
    fn from(node: MarshalledNode) -> Self {
        Source::Marshalled(Arc::new(node))
    }
}

impl From<Vec<Source>> for Source {
    fn from(items: Vec<Source>) -> Self {
        Source::Iterable(items.into())
    }
}

impl<T: Into<Source>> From<Option<T>> for Source {
    fn from(value: Option<T>) -> Self {
        value.map_or(Source::Empty, Into::into)
    }
}
