use super::parser::PageText;

pub const DEFAULT_CHUNK_SIZE: usize = 400;
pub const MIN_CHUNK_SIZE: usize = 300;
pub const MAX_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

#[derive(Debug, Clone)]
pub struct Chunk {
    pub page_number: i32,
    pub chunk_id: i32,
    pub text: String,
}

pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE),
            overlap,
        }
    }

    /// Slide a fixed-size character window over each page's text
    /// independently. Indexed by `char`, not byte, so multi-byte Vietnamese
    /// diacritics never get split across a window boundary. `chunk_id`
    /// resets to zero at the start of every page and only increments for
    /// windows that still have content after trimming.
    pub fn chunk_pages(&self, pages: &[PageText]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in pages {
            let chars: Vec<char> = page.text.chars().collect();
            if chars.is_empty() {
                continue;
            }

            let step = self.chunk_size.saturating_sub(self.overlap).max(1);
            let mut chunk_id = 0i32;
            let mut start = 0usize;

            while start < chars.len() {
                let end = (start + self.chunk_size).min(chars.len());
                let window: String = chars[start..end].iter().collect();
                let trimmed = window.trim();
                if !trimmed.is_empty() {
                    chunks.push(Chunk {
                        page_number: page.page_number,
                        chunk_id,
                        text: trimmed.to_string(),
                    });
                    chunk_id += 1;
                }

                if end == chars.len() {
                    break;
                }
                start += step;
            }
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: i32, chars: usize) -> PageText {
        PageText {
            page_number: n,
            text: "a".repeat(chars),
        }
    }

    #[test]
    fn chunk_id_resets_per_page() {
        let chunker = Chunker::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP);
        let pages = vec![page(1, 900), page(2, 900)];
        let chunks = chunker.chunk_pages(&pages);
        let page1_ids: Vec<i32> = chunks.iter().filter(|c| c.page_number == 1).map(|c| c.chunk_id).collect();
        let page2_ids: Vec<i32> = chunks.iter().filter(|c| c.page_number == 2).map(|c| c.chunk_id).collect();
        assert_eq!(page1_ids[0], 0);
        assert_eq!(page2_ids[0], 0);
    }

    #[test]
    fn windows_stay_within_char_budget() {
        let chunker = Chunker::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP);
        let pages = vec![page(1, 1_200)];
        let chunks = chunker.chunk_pages(&pages);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= DEFAULT_CHUNK_SIZE));
        assert!(chunks.len() > 1);
    }

    #[test]
    fn respects_utf8_multibyte_boundaries() {
        let chunker = Chunker::new(MIN_CHUNK_SIZE, 50);
        let text: String = "Cộng hòa xã hội chủ nghĩa Việt Nam ".repeat(40);
        let char_count = text.chars().count();
        let pages = vec![PageText { page_number: 1, text }];
        let chunks = chunker.chunk_pages(&pages);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= MIN_CHUNK_SIZE);
        }
        let covered: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
        assert!(covered >= char_count.min(MIN_CHUNK_SIZE));
    }

    #[test]
    fn clamps_out_of_range_chunk_size() {
        let chunker = Chunker::new(50, 10);
        assert_eq!(chunker.chunk_size, MIN_CHUNK_SIZE);
        let chunker = Chunker::new(10_000, 10);
        assert_eq!(chunker.chunk_size, MAX_CHUNK_SIZE);
    }

    #[test]
    fn empty_page_yields_no_chunks() {
        let chunker = Chunker::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP);
        let pages = vec![page(1, 0)];
        assert!(chunker.chunk_pages(&pages).is_empty());
    }
}
