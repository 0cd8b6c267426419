//! Application value types shipped by the exporter.
//!
//! These are the aggregates the serializer knows how to lay out: geometry
//! scalars, plugin references, per-vertex channel maps, instancing batches,
//! and rendered image sets. Field order in each `Wire` impl is the wire
//! order the server expects.

use std::collections::BTreeMap;

use super::serializer::{SerializerStream, Wire};

/// Three-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Wire for Vec3 {
    fn put(&self, out: &mut SerializerStream) {
        out.write(&self.x).write(&self.y).write(&self.z);
    }
}

/// RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Wire for Color {
    fn put(&self, out: &mut SerializerStream) {
        out.write(&self.r).write(&self.g).write(&self.b);
    }
}

/// 3x3 rotation/scale matrix, stored as three column vectors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Matrix {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
}

impl Wire for Matrix {
    fn put(&self, out: &mut SerializerStream) {
        out.write(&self.v0).write(&self.v1).write(&self.v2);
    }
}

/// Affine transform: matrix plus translation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub matrix: Matrix,
    pub offset: Vec3,
}

impl Wire for Transform {
    fn put(&self, out: &mut SerializerStream) {
        out.write(&self.matrix).write(&self.offset);
    }
}

/// Transparent scalar wrapper; writes exactly like its inner value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimpleAttr<T>(pub T);

impl<T: Wire> Wire for SimpleAttr<T> {
    fn put(&self, out: &mut SerializerStream) {
        self.0.put(out);
    }
}

/// Reference to an output socket of another plugin.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PluginRef {
    pub plugin: String,
    pub output: String,
}

impl PluginRef {
    pub fn new(plugin: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            output: output.into(),
        }
    }
}

impl Wire for PluginRef {
    fn put(&self, out: &mut SerializerStream) {
        out.write(&self.plugin).write(&self.output);
    }
}

/// One named mapping channel: per-vertex values plus face indices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapChannel {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<i32>,
    pub name: String,
}

/// All mapping channels of a mesh, keyed by channel name.
///
/// `BTreeMap` keeps the wire order deterministic, like the ordered map the
/// server iterates on its side.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapChannels {
    pub data: BTreeMap<String, MapChannel>,
}

impl Wire for MapChannels {
    fn put(&self, out: &mut SerializerStream) {
        out.write(&(self.data.len() as i32));
        for (key, channel) in &self.data {
            out.write(key)
                .write(&channel.vertices)
                .write(&channel.faces)
                .write(&channel.name);
        }
    }
}

/// One instanced node: placement, motion, and the node it clones.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstancerItem {
    pub index: i32,
    pub transform: Transform,
    pub velocity: Vec3,
    pub node: PluginRef,
}

impl Wire for InstancerItem {
    fn put(&self, out: &mut SerializerStream) {
        out.write(&self.index)
            .write(&self.transform)
            .write(&self.velocity)
            .write(&self.node);
    }
}

/// A batch of instances for one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Instancer {
    pub frame_number: i32,
    pub data: Vec<InstancerItem>,
}

impl Wire for Instancer {
    fn put(&self, out: &mut SerializerStream) {
        out.write(&self.frame_number).write(&self.data);
    }
}

/// A rendered image region.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Image {
    /// Pixel format tag agreed with the server.
    pub image_type: i32,
    pub width: i32,
    pub height: i32,
    pub x: i32,
    pub y: i32,
    /// Pixel blob; its length is the on-wire `size` field.
    pub data: Vec<u8>,
}

impl Wire for Image {
    fn put(&self, out: &mut SerializerStream) {
        out.write(&self.image_type)
            .write(&(self.data.len() as i32))
            .write(&self.width)
            .write(&self.height)
            .write(&self.x)
            .write(&self.y);
        out.write_bytes(&self.data);
    }
}

/// A set of rendered images keyed by render channel id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageSet {
    /// Where the images came from (render element source tag).
    pub source_type: i32,
    pub images: BTreeMap<i32, Image>,
}

impl Wire for ImageSet {
    fn put(&self, out: &mut SerializerStream) {
        out.write(&self.source_type).write(&(self.images.len() as i32));
        for (channel, image) in &self.images {
            out.write(channel).write(image);
        }
    }
}
