//! Dependency ordered loading and saving of file descriptor sets.
//!
//! Files are kept as their raw encoded bytes until they are added to a
//! [`DescriptorPool`], so custom options survive a load/save cycle untouched.

use std::collections::{BTreeMap, HashSet};

use bytes::Bytes;
use indexmap::IndexMap;
use prost::Message;
use prost_reflect::{DescriptorPool, FileDescriptor};
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};

/// `google.protobuf.FileDescriptorSet` with each file left encoded.
#[derive(Clone, PartialEq, Message)]
struct RawFileDescriptorSet {
    #[prost(bytes = "bytes", repeated, tag = "1")]
    file: Vec<Bytes>,
}

struct RawFile {
    bytes: Bytes,
    dependencies: Vec<String>,
}

/// Load every file of an encoded `FileDescriptorSet`.
pub fn load(set: &[u8]) -> BridgeResult<BTreeMap<String, FileDescriptor>> {
    load_files(split(set)?)
}

/// The still encoded files of a `FileDescriptorSet`, in set order.
pub fn split(set: &[u8]) -> BridgeResult<Vec<Bytes>> {
    Ok(RawFileDescriptorSet::decode(set)?.file)
}

/// Load individually encoded `FileDescriptorProto`s, as carried by a reflection
/// response. Every dependency must be present in `files`.
pub fn load_files(files: Vec<Bytes>) -> BridgeResult<BTreeMap<String, FileDescriptor>> {
    let mut index: IndexMap<String, RawFile> = IndexMap::with_capacity(files.len());
    for bytes in files {
        let proto = prost_types::FileDescriptorProto::decode(bytes.clone())?;
        let name = proto.name.unwrap_or_default();
        // First occurrence wins; identical files are commonly repeated.
        index.entry(name).or_insert(RawFile {
            bytes,
            dependencies: proto.dependency,
        });
    }

    let mut loader = Loader {
        index: &index,
        pool: DescriptorPool::new(),
        built: HashSet::new(),
        in_progress: Vec::new(),
    };
    for name in index.keys() {
        loader.build(name)?;
    }

    let pool = loader.pool;
    let mut loaded = BTreeMap::new();
    for name in index.keys() {
        let file = pool
            .get_file_by_name(name)
            .ok_or_else(|| BridgeError::FileNotFound(name.clone()))?;
        loaded.insert(name.clone(), file);
    }
    debug!("Loaded {} file descriptors", loaded.len());
    Ok(loaded)
}

struct Loader<'a> {
    index: &'a IndexMap<String, RawFile>,
    pool: DescriptorPool,
    built: HashSet<String>,
    in_progress: Vec<String>,
}

impl Loader<'_> {
    fn build(&mut self, name: &str) -> BridgeResult<()> {
        if self.built.contains(name) {
            return Ok(());
        }
        if let Some(pos) = self.in_progress.iter().position(|n| n == name) {
            let mut chain = self.in_progress[pos..].to_vec();
            chain.push(name.to_string());
            return Err(BridgeError::DependencyCycle { chain });
        }
        let Some(raw) = self.index.get(name) else {
            return Err(BridgeError::FileNotFound(name.to_string()));
        };

        self.in_progress.push(name.to_string());
        for dependency in &raw.dependencies {
            if !self.index.contains_key(dependency) {
                return Err(BridgeError::DependencyNotFound {
                    file: name.to_string(),
                    dependency: dependency.clone(),
                });
            }
            self.build(dependency)?;
        }
        self.in_progress.pop();

        self.pool.decode_file_descriptor_proto(raw.bytes.clone())?;
        self.built.insert(name.to_string());
        Ok(())
    }
}

/// Encode files and all of their transitive dependencies as one
/// `FileDescriptorSet`, dependencies before dependents.
pub fn save<I>(files: I) -> Bytes
where
    I: IntoIterator<Item = FileDescriptor>,
{
    let mut ordered: IndexMap<String, FileDescriptor> = IndexMap::new();
    for file in files {
        collect(file, &mut ordered);
    }
    let set = RawFileDescriptorSet {
        file: ordered
            .values()
            .map(|file| Bytes::from(file.encode_to_vec()))
            .collect(),
    };
    Bytes::from(set.encode_to_vec())
}

fn collect(file: FileDescriptor, ordered: &mut IndexMap<String, FileDescriptor>) {
    if ordered.contains_key(file.name()) {
        return;
    }
    for dependency in file.dependencies() {
        collect(dependency, ordered);
    }
    ordered.insert(file.name().to_string(), file);
}
