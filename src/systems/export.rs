// saves the city as an obj file
// by walking the generated chunks and buildings, or as a text tile dump

use bevy::prelude::*;
use bevy::render::mesh::{Indices, VertexAttributeValues};
use std::fs::File;
use std::io::{BufWriter, Write};

use crate::systems::city::Catalog;
use crate::systems::city::procgen::catalog::BuildingCatalog;
use crate::systems::city::procgen::mesh_gen::box_mesh;
use crate::systems::city::world::City;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExportFormat {
    Obj,
    Ascii,
}

// export event
#[derive(Event)]
pub struct ExportEvent {
    pub filename: String,
    pub format: ExportFormat,
}

// one mesh as an obj object, returns the number of vertices written
fn write_mesh<W: Write>(
    writer: &mut W,
    mesh: &Mesh,
    transform: &Transform,
    name: &str,
    vertex_offset: u32,
) -> std::io::Result<u32> {
    let Some(VertexAttributeValues::Float32x3(vertices)) = mesh.attribute(Mesh::ATTRIBUTE_POSITION)
    else {
        return Ok(0);
    };

    writeln!(writer, "o {}", name)?;
    for vertex in vertices {
        let v = transform.transform_point(Vec3::from(*vertex));
        writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
    }

    // OBJ indices start at 1
    let faces: Vec<u32> = match mesh.indices() {
        Some(Indices::U16(indices)) => indices.iter().map(|&i| i as u32).collect(),
        Some(Indices::U32(indices)) => indices.clone(),
        None => Vec::new(),
    };
    for face in faces.chunks_exact(3) {
        writeln!(
            writer,
            "f {} {} {}",
            vertex_offset + face[0],
            vertex_offset + face[1],
            vertex_offset + face[2]
        )?;
    }
    writeln!(writer)?;

    Ok(vertices.len() as u32)
}

/// Ground chunks and standing buildings, in z-up city space.
pub fn write_obj<W: Write>(
    writer: &mut W,
    city: &City,
    catalog: &BuildingCatalog,
) -> Result<usize, Box<dyn std::error::Error>> {
    writeln!(writer, "# city export, z up")?;

    let mut vertex_offset = 1;
    let mut object_count = 0;

    for (i, chunk) in city.chunks().iter().enumerate() {
        let transform = Transform::from_translation(chunk.offset);
        let name = format!("Chunk_{}", i);
        vertex_offset += write_mesh(writer, &chunk.to_mesh(), &transform, &name, vertex_offset)?;
        object_count += 1;
    }

    for group in city.groups() {
        for &index in group.live() {
            let building = &group.buildings()[index];
            let footprint = catalog.footprint(&building.name)?;
            let name = format!("Building_{}_{}_{}", group.block, index, building.name);
            vertex_offset += write_mesh(
                writer,
                &box_mesh(&footprint.bounds),
                &group.world_transform(building),
                &name,
                vertex_offset,
            )?;
            object_count += 1;
        }
    }

    Ok(object_count)
}

pub fn export_city(
    city: &City,
    catalog: &BuildingCatalog,
    event: &ExportEvent,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(&event.filename)?;
    let mut writer = BufWriter::new(file);

    match event.format {
        ExportFormat::Obj => {
            let count = write_obj(&mut writer, city, catalog)?;
            info!("exported {} objects to {}", count, event.filename);
        }
        ExportFormat::Ascii => {
            writeln!(writer, "{}", city.network().to_ascii())?;
            info!("wrote tile map to {}", event.filename);
        }
    }

    writer.flush()?;
    Ok(())
}

// handle export events
pub fn handle_export(
    mut events: EventReader<ExportEvent>,
    city: Option<Res<City>>,
    catalog: Res<Catalog>,
) {
    for event in events.read() {
        let Some(city) = city.as_deref() else {
            warn!("nothing to export, no city generated");
            continue;
        };
        if let Err(e) = export_city(city, &catalog.0, event) {
            error!("export to {} failed: {}", event.filename, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::city::{default_catalog, CityParams};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn obj_references_only_written_vertices() {
        let catalog = default_catalog().unwrap();
        let params = CityParams {
            width: 40,
            height: 30,
            ..default()
        };
        let city = City::generate(&params, &catalog, &mut StdRng::seed_from_u64(6)).unwrap();

        let mut out = Vec::new();
        let objects = write_obj(&mut out, &city, &catalog).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(objects, city.chunks().len() + city.live_count());
        assert_eq!(text.lines().filter(|l| l.starts_with("o ")).count(), objects);

        let vertices = text.lines().filter(|l| l.starts_with("v ")).count();
        let ground: usize = city.chunks().iter().map(|c| c.positions.len()).sum();
        assert!(vertices >= ground);
        for line in text.lines().filter(|l| l.starts_with("f ")) {
            for index in line[2..].split_whitespace() {
                let index: usize = index.parse().unwrap();
                assert!(index >= 1 && index <= vertices);
            }
        }
    }
}
