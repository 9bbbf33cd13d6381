use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use forensicmap::{
    project::store::read_project, report::DrawOp, FileProjectStore, FixedPathPicker, ProjectStore,
    RasterConfig, ReportGenerator, ReportSink, TileRasterizer,
};
use tempfile::NamedTempFile;

#[derive(Parser, Debug)]
#[clap(version, about = "Forensic scene maps and reports")]
struct Options {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a project's map and write its report
    Render {
        /// Project JSON file
        project: PathBuf,

        /// Directory the map image and report text are written to
        #[clap(long, default_value = ".")]
        out_dir: PathBuf,

        /// Raster config JSON; unspecified fields keep their defaults
        #[clap(long)]
        config: Option<PathBuf>,

        /// Map width in pixels
        #[clap(long)]
        width: Option<u32>,

        /// Map height in pixels
        #[clap(long)]
        height: Option<u32>,

        /// Zoom to render at instead of the project's saved zoom
        #[clap(long)]
        zoom: Option<f64>,

        /// Tile URL template with {z}, {x} and {y}
        #[clap(long)]
        tile_url: Option<String>,
    },

    /// Create an empty project file
    New {
        name: String,

        /// Where the project JSON is written
        #[clap(long)]
        output: PathBuf,
    },
}

/// Writes the map as `<project>_map.png` and the report text next to it.
///
/// Both files are staged in the output directory and renamed into place, so
/// a failed export leaves neither half behind.
struct DirectorySink {
    dir: PathBuf,
    map_file: String,
    ops: Vec<DrawOp>,
}

impl ReportSink for DirectorySink {
    fn draw(&mut self, op: DrawOp) -> forensicmap::Result<()> {
        self.ops.push(op);
        Ok(())
    }

    fn finish(&mut self, file_name: &str) -> forensicmap::Result<()> {
        let mut text = Vec::new();
        let mut png = None;
        for op in &self.ops {
            match op {
                DrawOp::Image { png: data, .. } => png = Some(data.as_slice()),
                DrawOp::Text { text: line, .. } => text.push(line.as_str()),
                DrawOp::NewPage => text.push(""),
                DrawOp::FilledRect { .. } => {}
            }
        }

        let report = stage(&self.dir, text.join("\n").as_bytes())?;
        let map = png.map(|data| stage(&self.dir, data)).transpose()?;

        let report_path = self.dir.join(Path::new(file_name).with_extension("txt"));
        report.persist(&report_path).map_err(|e| e.error)?;
        if let Some(map) = map {
            let map_path = self.dir.join(&self.map_file);
            if let Err(e) = map.persist(&map_path) {
                let _ = std::fs::remove_file(&report_path);
                return Err(e.error.into());
            }
            log::info!("wrote {}", map_path.display());
        }
        log::info!("wrote {}", report_path.display());
        Ok(())
    }
}

fn stage(dir: &Path, data: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.flush()?;
    Ok(file)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    match Options::parse().command {
        Command::Render {
            project,
            out_dir,
            config,
            width,
            height,
            zoom,
            tile_url,
        } => {
            let project = read_project(&project)
                .with_context(|| format!("cannot read project {}", project.display()))?;

            let mut config = match config {
                Some(path) => RasterConfig::from_json_file(&path)
                    .with_context(|| format!("cannot load config {}", path.display()))?,
                None => RasterConfig::default(),
            };
            if let Some(width) = width {
                config.width = width;
            }
            if let Some(height) = height {
                config.height = height;
            }
            if let Some(tile_url) = tile_url {
                config.tile_url = tile_url;
            }

            let mut view = project.view();
            if let Some(zoom) = zoom {
                view.zoom = zoom;
            }

            std::fs::create_dir_all(&out_dir)?;
            let mut sink = DirectorySink {
                dir: out_dir,
                map_file: format!("{}_map.png", project.name),
                ops: Vec::new(),
            };

            let generator = ReportGenerator::new(TileRasterizer::new(config)?);
            let today = chrono::Local::now().date_naive();
            let summary = generator.export(&project, &view, today, &mut sink).await?;

            if !summary.map_rendered {
                eprintln!("Map could not be rendered; the report shows a placeholder");
            } else if summary.tiles_failed > 0 {
                eprintln!(
                    "{} of {} tiles failed to load",
                    summary.tiles_failed,
                    summary.tiles_drawn + summary.tiles_failed
                );
            }
            println!("Measurements & Assets:");
            for line in &summary.lines {
                println!("{}", line);
            }
        }
        Command::New { name, output } => {
            let store = FileProjectStore::new(FixedPathPicker::new(&output));
            let project = store.create(&name);
            store
                .save(&project)
                .with_context(|| format!("cannot write {}", output.display()))?;
            println!("Created project {} ({}) at {}", project.name, project.id, output.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(dir: &Path) -> DirectorySink {
        let mut sink = DirectorySink {
            dir: dir.to_path_buf(),
            map_file: "Scene_map.png".to_string(),
            ops: Vec::new(),
        };
        let text = |y: f64, text: &str| DrawOp::Text {
            x: 10.0,
            y,
            size: 11.0,
            text: text.to_string(),
        };
        sink.draw(text(10.0, "Scene")).unwrap();
        sink.draw(DrawOp::Image {
            x: 15.0,
            y: 30.0,
            width: 180.0,
            height: 100.0,
            png: vec![1, 2, 3],
        })
        .unwrap();
        sink.draw(DrawOp::NewPage).unwrap();
        sink.draw(text(17.0, "1. P1 - baseline: X=10m, Y=0m")).unwrap();
        sink
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_finish_writes_map_and_transcript() {
        let dir = tempfile::tempdir().unwrap();
        sink(dir.path()).finish("Scene_report.pdf").unwrap();

        assert_eq!(entries(dir.path()), vec!["Scene_map.png", "Scene_report.txt"]);
        assert_eq!(std::fs::read(dir.path().join("Scene_map.png")).unwrap(), vec![1, 2, 3]);
        let transcript = std::fs::read_to_string(dir.path().join("Scene_report.txt")).unwrap();
        assert_eq!(transcript, "Scene\n\n1. P1 - baseline: X=10m, Y=0m");
    }

    #[test]
    fn test_failed_finish_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let result = sink(dir.path()).finish("missing/Scene_report.pdf");

        assert!(result.is_err());
        assert!(entries(dir.path()).is_empty());
    }
}
