//! Static VR page showing a gaussian-splat scan of an artwork.
//!
//! The scene is described declaratively and rendered to a standalone HTML
//! document that loads A-Frame and the splatting component from their CDNs.

use std::fmt::{self, Write};

pub const AFRAME_SCRIPT: &str = "https://aframe.io/releases/1.4.2/aframe.min.js";
pub const SPLAT_SCRIPT: &str = "https://quadjr.github.io/aframe-gaussian-splatting/index.js";
pub const VENUS_SPLAT: &str = "https://huggingface.co/xValentim/splat-masp/resolve/main/venus.splat";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub property: String,
    pub to: Vec3,
    pub duration_ms: u32,
    pub easing: String,
    pub looping: bool,
}

impl Animation {
    /// A full turn around the vertical axis.
    pub fn spin(duration_ms: u32) -> Self {
        Self {
            property: "rotation".to_string(),
            to: Vec3::new(0.0, 360.0, 0.0),
            duration_ms,
            easing: "linear".to_string(),
            looping: true,
        }
    }

    fn attribute(&self) -> String {
        format!(
            "property: {}; to: {}; dur: {}; easing: {}; loop: {}",
            self.property, self.to, self.duration_ms, self.easing, self.looping
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    pub position: Option<Vec3>,
    pub rotation: Option<Vec3>,
    pub animation: Option<Animation>,
    /// Source of a `.splat` point cloud.
    pub splat: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub title: String,
    pub scripts: Vec<String>,
    pub antialias: bool,
    pub stats: bool,
    pub entities: Vec<Entity>,
    pub sky_color: String,
}

impl Default for Scene {
    fn default() -> Self {
        Self::venus(VENUS_SPLAT)
    }
}

impl Scene {
    /// The fixed exhibit page: a spinning anchor entity, the splat scan in
    /// front of the viewer and a black sky.
    pub fn venus(splat_src: &str) -> Self {
        Self {
            title: "Firefingers VR".to_string(),
            scripts: vec![AFRAME_SCRIPT.to_string(), SPLAT_SCRIPT.to_string()],
            antialias: false,
            stats: true,
            entities: vec![
                Entity {
                    position: Some(Vec3::new(0.0, 1.6, -2.0)),
                    animation: Some(Animation::spin(10_000)),
                    ..Entity::default()
                },
                Entity {
                    position: Some(Vec3::new(0.0, 1.5, -2.0)),
                    rotation: Some(Vec3::new(0.0, 0.0, 0.0)),
                    splat: Some(splat_src.to_string()),
                    ..Entity::default()
                },
            ],
            sky_color: "#000".to_string(),
        }
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_html(&mut html);
        html
    }

    fn write_html(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html>")?;
        writeln!(out, "  <head>")?;
        writeln!(out, "    <meta charset=\"utf-8\">")?;
        writeln!(out, "    <title>{}</title>", escape(&self.title))?;
        for script in &self.scripts {
            writeln!(out, "    <script src=\"{}\"></script>", escape(script))?;
        }
        writeln!(out, "  </head>")?;
        writeln!(out, "  <body>")?;

        write!(out, "    <a-scene renderer=\"antialias: {}\"", self.antialias)?;
        if self.stats {
            write!(out, " stats")?;
        }
        writeln!(out, ">")?;

        for entity in &self.entities {
            write!(out, "      <a-entity")?;
            if let Some(src) = &entity.splat {
                write!(out, " gaussian_splatting=\"src: {};\"", escape(src))?;
            }
            if let Some(rotation) = entity.rotation {
                write!(out, " rotation=\"{}\"", rotation)?;
            }
            if let Some(position) = entity.position {
                write!(out, " position=\"{}\"", position)?;
            }
            if let Some(animation) = &entity.animation {
                write!(out, " animation=\"{}\"", escape(&animation.attribute()))?;
            }
            writeln!(out, "></a-entity>")?;
        }

        writeln!(out, "      <a-sky color=\"{}\"></a-sky>", escape(&self.sky_color))?;
        writeln!(out, "    </a-scene>")?;
        writeln!(out, "  </body>")?;
        writeln!(out, "</html>")
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
