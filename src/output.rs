use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use crate::{
    config::Config,
    distribution::Distributions,
    grid::CellMap,
    lattice::D3Q19,
    macroscopic::{MacroscopicFields, Snapshot},
    solver::SnapshotSink,
};

const DUMP_PRECISION: usize = 6;
const VTK_PRECISION: usize = 16;

/// Decimal digit count, with 0 counted as one digit.
pub fn digits(value: usize) -> usize {
    value.checked_ilog10().map_or(1, |d| d as usize + 1)
}

/// Writes density and velocity as VTK ImageData over the region inside the
/// wall shell, and keeps track of the files for a ParaView collection.
pub struct VTKWriter {
    output_directory: PathBuf,
    dim: usize,
    iteration_digits: usize,
    collection_entries: Vec<(usize, String)>, // (iteration, filename)
}

impl VTKWriter {
    pub fn new(config: &Config) -> Self {
        Self {
            output_directory: PathBuf::from(&config.output.output_directory),
            dim: config.domain.dim,
            iteration_digits: digits(config.simulation.iterations),
            collection_entries: Vec::new(),
        }
    }

    pub fn filename(&self, iteration: usize) -> String {
        format!("lbm.{:0width$}.vti", iteration, width = self.iteration_digits)
    }

    pub fn write(&mut self, fields: &MacroscopicFields, iteration: usize) -> Result<PathBuf> {
        let filename = self.filename(iteration);
        let path = self.output_directory.join(&filename);
        let mut file = BufWriter::new(
            File::create(&path).with_context(|| format!("creating {}", path.display()))?,
        );

        let n = self.dim;
        let extent = n - 3;
        let interior = 1..n - 1;

        writeln!(file, "<?xml version=\"1.0\"?>")?;
        writeln!(file, "<VTKFile type=\"ImageData\" version=\"0.1\" byte_order=\"LittleEndian\">")?;
        writeln!(
            file,
            "  <ImageData WholeExtent=\"0 {e} 0 {e} 0 {e}\" Origin=\"0 0 0\" Spacing=\"1 1 1\">",
            e = extent
        )?;
        writeln!(file, "    <Piece Extent=\"0 {e} 0 {e} 0 {e}\">", e = extent)?;
        writeln!(file, "      <PointData Scalars=\"rho\" Vectors=\"v\">")?;

        // Density
        writeln!(file, "        <DataArray type=\"Float32\" Name=\"rho\" NumberOfComponents=\"1\" format=\"ascii\">")?;
        for z in interior.clone() {
            for y in interior.clone() {
                for x in interior.clone() {
                    let id = x + y * n + z * n * n;
                    write!(file, "{:.*e} ", VTK_PRECISION, fields.rho[id])?;
                }
                writeln!(file)?;
            }
            writeln!(file)?;
        }
        writeln!(file, "        </DataArray>")?;

        // Velocity
        writeln!(file, "        <DataArray type=\"Float32\" Name=\"v\" NumberOfComponents=\"3\" format=\"ascii\">")?;
        for z in interior.clone() {
            for y in interior.clone() {
                for x in interior.clone() {
                    let [ux, uy, uz] = fields.velocity[x + y * n + z * n * n];
                    write!(
                        file,
                        "{:.p$e} {:.p$e} {:.p$e} ",
                        ux,
                        uy,
                        uz,
                        p = VTK_PRECISION
                    )?;
                }
                writeln!(file)?;
            }
            writeln!(file)?;
        }
        writeln!(file, "        </DataArray>")?;

        writeln!(file, "      </PointData>")?;
        writeln!(file, "    </Piece>")?;
        writeln!(file, "  </ImageData>")?;
        writeln!(file, "</VTKFile>")?;
        file.flush()?;

        self.collection_entries.push((iteration, filename));
        Ok(path)
    }

    /// Write a ParaView collection file that groups all VTI files by iteration
    pub fn write_collection(&self, collection_filename: &str) -> Result<PathBuf> {
        let path = self.output_directory.join(collection_filename);
        let mut file = BufWriter::new(
            File::create(&path).with_context(|| format!("creating {}", path.display()))?,
        );

        writeln!(file, "<?xml version=\"1.0\"?>")?;
        writeln!(file, "<VTKFile type=\"Collection\" version=\"0.1\">")?;
        writeln!(file, "  <Collection>")?;

        for (iteration, filename) in &self.collection_entries {
            writeln!(file, "    <DataSet timestep=\"{}\" part=\"0\" file=\"{}\"/>",
                     iteration, filename)?;
        }

        writeln!(file, "  </Collection>")?;
        writeln!(file, "</VTKFile>")?;
        file.flush()?;

        Ok(path)
    }

    /// Get the number of files written so far
    pub fn get_file_count(&self) -> usize {
        self.collection_entries.len()
    }
}

/// Cell-map dump: one integer code per cell, rows along x, blank line between z planes.
pub fn write_map_dump(path: &Path, map: &CellMap) -> Result<()> {
    let mut file = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );

    writeln!(file, "# FLUID       1")?;
    writeln!(file, "# MOVING      2")?;
    writeln!(file, "# BOUNDARY    3")?;
    writeln!(file, "# WALL        4")?;
    writeln!(file, "# CORNER      5")?;
    writeln!(file)?;

    let n = map.grid().dim();
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let code = map.at(x, y, z).map_or(0, |c| c.dump_code());
                write!(file, "{} ", code)?;
            }
            writeln!(file)?;
        }
        writeln!(file)?;
    }
    writeln!(file)?;
    file.flush()?;
    Ok(())
}

/// Population dump: for every (y, z) row a header with the direction indices,
/// then one line per x holding the cell coordinates and its 19 populations.
pub fn write_population_dump(path: &Path, dist: &Distributions, map: &CellMap) -> Result<()> {
    let mut file = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );

    let grid = map.grid();
    let n = grid.dim();
    let width = DUMP_PRECISION + 2;
    let coord_width = digits(n) * 3 + 5;

    for z in 0..n {
        for y in 0..n {
            write!(file, "{:coord_width$}", "")?;
            for q in 0..D3Q19::Q {
                write!(file, "{:>width$} ", q)?;
            }
            writeln!(file)?;

            for x in 0..n {
                let coords = format!("({},{},{})", x, y, z);
                write!(file, "{:<coord_width$}", coords)?;
                if let Some(id) = grid.index(x, y, z) {
                    for value in dist.cell(id) {
                        write!(file, "{:>width$.prec$} ", value, prec = DUMP_PRECISION)?;
                    }
                }
                writeln!(file)?;
            }
            writeln!(file)?;
        }
        writeln!(file)?;
    }
    writeln!(file)?;
    file.flush()?;
    Ok(())
}

/// Sink that writes the configured outputs at every sample and drives a
/// progress bar over the iterations.
pub struct OutputSink {
    output_directory: PathBuf,
    write_vti: bool,
    dump_map: bool,
    dump_f: bool,
    iteration_digits: usize,
    map_written: bool,
    vtk_writer: VTKWriter,
    progress: ProgressBar,
}

impl OutputSink {
    pub fn new(config: &Config) -> Result<Self> {
        let output_directory = PathBuf::from(&config.output.output_directory);
        std::fs::create_dir_all(&output_directory)
            .with_context(|| format!("creating output directory {}", output_directory.display()))?;

        let progress = ProgressBar::new(config.simulation.iterations as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} iterations {msg}",
        ) {
            progress.set_style(style);
        }

        Ok(Self {
            output_directory,
            write_vti: config.output.write_vti,
            dump_map: config.output.dump_map,
            dump_f: config.output.dump_f,
            iteration_digits: digits(config.simulation.iterations),
            map_written: false,
            vtk_writer: VTKWriter::new(config),
            progress,
        })
    }

    /// Same sink with the progress bar suppressed.
    pub fn quiet(config: &Config) -> Result<Self> {
        let mut sink = Self::new(config)?;
        sink.progress = ProgressBar::hidden();
        Ok(sink)
    }
}

impl SnapshotSink for OutputSink {
    fn on_sample(&mut self, snapshot: &Snapshot) -> Result<()> {
        // The map never changes; dump it once.
        if self.dump_map && !self.map_written {
            let path = self.output_directory.join("map.dump");
            write_map_dump(&path, snapshot.map)?;
            self.map_written = true;
            info!("Wrote cell map: {}", path.display());
        }

        if self.dump_f {
            let filename = format!("f_{:0width$}.dump", snapshot.iteration, width = self.iteration_digits);
            write_population_dump(&self.output_directory.join(filename), snapshot.distributions, snapshot.map)?;
        }

        if self.write_vti {
            let path = self.vtk_writer.write(snapshot.fields, snapshot.iteration)?;
            self.progress.set_message(format!("wrote {}", path.display()));
        }
        Ok(())
    }

    fn on_iteration(&mut self, _iteration: usize) {
        self.progress.inc(1);
    }

    fn finish(&mut self) -> Result<()> {
        self.progress.finish();
        if self.vtk_writer.get_file_count() > 0 {
            let path = self.vtk_writer.write_collection("lbm.pvd")?;
            info!("Wrote collection file: {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use crate::{config::Face, grid::Grid, kernels::init::initialize, layout::Layout};

    fn setup(dim: usize) -> (CellMap, Distributions) {
        let grid = Grid::new(dim);
        let map = CellMap::classify(grid, Some(Face::Front));
        let layout = Layout::new(grid.cells(), 4);
        let [collide, _] = initialize(layout, &map, 1.0, &Vector3::new(0.05, 0.0, 0.0));
        (map, collide)
    }

    #[test]
    fn digit_counts() {
        assert_eq!(digits(0), 1);
        assert_eq!(digits(9), 1);
        assert_eq!(digits(10), 2);
        assert_eq!(digits(1000), 4);
    }

    #[test]
    fn vti_covers_interior_extent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.domain.dim = 5;
        config.simulation.iterations = 100;
        config.output.output_directory = dir.path().to_string_lossy().into_owned();

        let (map, dist) = setup(5);
        let fields = MacroscopicFields::compute(&dist, &map);
        let mut writer = VTKWriter::new(&config);
        let path = writer.write(&fields, 7).unwrap();

        assert_eq!(path.file_name().unwrap(), "lbm.007.vti");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("WholeExtent=\"0 2 0 2 0 2\""));
        assert!(text.contains("Name=\"rho\""));
        assert!(text.contains("Name=\"v\""));
        assert!(!text.contains("NaN"));

        let rho_block = text
            .split("Name=\"rho\" NumberOfComponents=\"1\" format=\"ascii\">")
            .nth(1)
            .and_then(|rest| rest.split("</DataArray>").next())
            .unwrap();
        assert_eq!(rho_block.split_whitespace().count(), 27);

        let pvd = writer.write_collection("lbm.pvd").unwrap();
        let collection = std::fs::read_to_string(pvd).unwrap();
        assert!(collection.contains("file=\"lbm.007.vti\""));
        assert_eq!(writer.get_file_count(), 1);
    }

    #[test]
    fn collection_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.output.output_directory = dir.path().join("missing").to_string_lossy().into_owned();

        let writer = VTKWriter::new(&config);
        let err = writer.write_collection("lbm.pvd").unwrap_err();
        assert!(format!("{err:#}").contains("lbm.pvd"));
    }

    #[test]
    fn map_dump_uses_cell_codes() {
        let dir = tempfile::tempdir().unwrap();
        let (map, _) = setup(4);
        let path = dir.path().join("map.dump");
        write_map_dump(&path, &map).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let codes: Vec<&str> = text
            .lines()
            .filter(|l| !l.starts_with('#'))
            .flat_map(|l| l.split_whitespace())
            .collect();
        assert_eq!(codes.len(), 64);
        assert_eq!(codes.iter().filter(|&&c| c == "4").count(), 64 - 8);
        // Four lid cells sit on the moving face, the other four are static corners.
        assert_eq!(codes.iter().filter(|&&c| c == "2").count(), 4);
        assert_eq!(codes.iter().filter(|&&c| c == "5").count(), 4);
    }

    #[test]
    fn population_dump_lists_every_cell() {
        let dir = tempfile::tempdir().unwrap();
        let (map, dist) = setup(3);
        let path = dir.path().join("f_0.dump");
        write_population_dump(&path, &dist, &map).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = text.lines().filter(|l| l.starts_with('(')).collect();
        assert_eq!(rows.len(), 27);
        let centre = rows.iter().find(|l| l.starts_with("(1,1,1)")).unwrap();
        assert_eq!(centre.split_whitespace().count(), 20);
    }

    #[test]
    fn sink_writes_configured_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.domain.dim = 4;
        config.simulation.iterations = 2;
        config.output.output_directory = dir.path().to_string_lossy().into_owned();
        config.output.dump_map = true;
        config.output.dump_f = true;

        let (map, dist) = setup(4);
        let fields = MacroscopicFields::compute(&dist, &map);
        let mut sink = OutputSink::quiet(&config).unwrap();
        for iteration in [0, 1] {
            sink.on_sample(&Snapshot {
                iteration,
                fields: &fields,
                distributions: &dist,
                map: &map,
            })
            .unwrap();
        }
        sink.finish().unwrap();

        for name in ["map.dump", "f_0.dump", "f_1.dump", "lbm.0.vti", "lbm.1.vti", "lbm.pvd"] {
            assert!(dir.path().join(name).exists(), "missing {name}");
        }
    }
}
