use std::io::{Read, Write};
use std::path::Path;

use super::vector_store::ChunkMetadata;

/// Raw little-endian f32 vectors, length-prefixed: `[count: u32][dim: u32][f32; count*dim]`.
pub fn save(
    vectors_path: &str,
    metadata_path: &str,
    dimension: usize,
    vectors: &[Vec<f32>],
    metadata: &[ChunkMetadata],
) -> std::io::Result<()> {
    if let Some(parent) = Path::new(vectors_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_vectors = format!("{vectors_path}.tmp");
    {
        let mut file = std::fs::File::create(&tmp_vectors)?;
        file.write_all(&(vectors.len() as u32).to_le_bytes())?;
        file.write_all(&(dimension as u32).to_le_bytes())?;
        for vector in vectors {
            for value in vector {
                file.write_all(&value.to_le_bytes())?;
            }
        }
        file.sync_all()?;
    }
    std::fs::rename(&tmp_vectors, vectors_path)?;

    let tmp_metadata = format!("{metadata_path}.tmp");
    {
        let mut file = std::fs::File::create(&tmp_metadata)?;
        let json = serde_json::to_vec(metadata)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_metadata, metadata_path)?;

    Ok(())
}

pub struct LoadedSnapshot {
    pub dimension: usize,
    pub vectors: Vec<Vec<f32>>,
    pub metadata: Vec<ChunkMetadata>,
}

/// Returns `None` on any read/parse/mismatch failure; callers fall back to a
/// fresh empty store rather than treating a bad snapshot as fatal.
pub fn load(vectors_path: &str, metadata_path: &str) -> Option<LoadedSnapshot> {
    let mut vectors_file = std::fs::File::open(vectors_path).ok()?;
    let mut buf = Vec::new();
    vectors_file.read_to_end(&mut buf).ok()?;
    if buf.len() < 8 {
        return None;
    }

    let count = u32::from_le_bytes(buf[0..4].try_into().ok()?) as usize;
    let dimension = u32::from_le_bytes(buf[4..8].try_into().ok()?) as usize;
    let expected_len = 8 + count * dimension * 4;
    if buf.len() != expected_len {
        tracing::warn!("vector snapshot size mismatch, discarding");
        return None;
    }

    let mut vectors = Vec::with_capacity(count);
    let mut offset = 8usize;
    for _ in 0..count {
        let mut vector = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            let bytes: [u8; 4] = buf[offset..offset + 4].try_into().ok()?;
            vector.push(f32::from_le_bytes(bytes));
            offset += 4;
        }
        vectors.push(vector);
    }

    let metadata_bytes = std::fs::read(metadata_path).ok()?;
    let metadata: Vec<ChunkMetadata> = serde_json::from_slice(&metadata_bytes).ok()?;

    if metadata.len() != vectors.len() {
        tracing::warn!("vector snapshot metadata/vector length mismatch, discarding");
        return None;
    }

    Some(LoadedSnapshot {
        dimension,
        vectors,
        metadata,
    })
}
