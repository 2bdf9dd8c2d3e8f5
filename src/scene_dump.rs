use crate::layout::{Bounds, PositionedNode, SceneGraph};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Serializable view of a laid-out scene, with connector curves resolved.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDump<'a> {
    pub width: f32,
    pub height: f32,
    pub bounds: Bounds,
    pub nodes: &'a [PositionedNode],
    pub connectors: Vec<ConnectorDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorDump {
    pub from: String,
    pub to: String,
    pub points: [[f32; 2]; 4],
    pub path: String,
}

impl<'a> SceneDump<'a> {
    pub fn from_scene(scene: &'a SceneGraph, curvature: f32) -> Self {
        let connectors = scene
            .connector_paths(curvature)
            .into_iter()
            .map(|routed| {
                let path = routed.path;
                ConnectorDump {
                    from: routed.from_id,
                    to: routed.to_id,
                    points: [path.start, path.control1, path.control2, path.end].map(|p| [p.x, p.y]),
                    path: path.to_svg_path(),
                }
            })
            .collect();

        SceneDump {
            width: scene.width(),
            height: scene.height(),
            bounds: scene.bounds,
            nodes: &scene.nodes,
            connectors,
        }
    }
}

/// Writes the scene as pretty JSON to `path`, or to stdout without one.
pub fn write_scene_dump(path: Option<&Path>, scene: &SceneGraph, curvature: f32) -> anyhow::Result<()> {
    let dump = SceneDump::from_scene(scene, curvature);
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &dump)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}
