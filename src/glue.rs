/*!
 * Geometric fragment gluing.
 *
 * Decides which filtered fragments of one cycle form the same logical text
 * block and concatenates them in reading order.
 *
 * Two fragments glue when they sit side by side on one line:
 *
 * ```text
 *   +-------+ - - - +-------+   -
 *   | Hello |       | World |   | vertical overlap
 *   +-------+ - - - +-------+   -
 *           |<-gap->|
 *       gap <= horizontal_glue * avg char width
 * ```
 *
 * or when they are stacked lines close enough vertically and sharing enough
 * width. Glue is transitive, and merging repeats over the merged blocks until
 * nothing changes, so the output is a fixpoint: gluing it again merges
 * nothing further.
 */

use log::{debug, warn};
use std::cmp::Ordering;

use crate::app_config::GlueRule;
use crate::errors::GlueError;
use crate::geometry::Rect;
use crate::ocr::TextFragment;

/// A glued block of one cycle.
///
/// `index` is a synthetic id valid for this cycle only; cross-cycle identity
/// is assigned by the stabilization tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct GluedBlock {
    pub index: usize,
    pub rect: Rect,
    pub text: String,
    /// Contributing fragments in reading order
    pub fragments: Vec<TextFragment>,
}

impl GluedBlock {
    /// Non-whitespace character count
    pub fn char_count(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }

    /// View the block as a single fragment, e.g. to glue it again
    pub fn as_fragment(&self) -> TextFragment {
        let provider = self.fragments.first().map(|f| f.provider.clone()).unwrap_or_default();
        TextFragment {
            provider,
            ..TextFragment::new(&self.text, self.rect)
        }
    }
}

/// Geometry and text length the pairwise predicates work on
#[derive(Debug, Clone, Copy)]
struct Piece {
    rect: Rect,
    chars: usize,
}

impl Piece {
    fn new(rect: Rect, text: &str) -> Self {
        Self {
            rect,
            chars: text.chars().count().max(1),
        }
    }

    fn avg_char_width(&self) -> f32 {
        self.rect.width / self.chars as f32
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Union keeping the smaller root so group order follows input order
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        match ra.cmp(&rb) {
            Ordering::Less => self.parent[rb] = ra,
            Ordering::Greater => self.parent[ra] = rb,
            Ordering::Equal => {}
        }
    }
}

/// Merges fragments into blocks according to one provider's glue rule
#[derive(Debug, Clone)]
pub struct GlueEngine {
    rule: GlueRule,
    max_fragments: usize,
}

impl GlueEngine {
    pub fn new(rule: GlueRule, max_fragments: usize) -> Self {
        Self { rule, max_fragments }
    }

    pub fn rule(&self) -> &GlueRule {
        &self.rule
    }

    fn glues_horizontally(&self, a: &Piece, b: &Piece) -> bool {
        let max_gap = self.rule.horizontal_glue * a.avg_char_width().max(b.avg_char_width());
        if a.rect.horizontal_gap(&b.rect) > max_gap {
            return false;
        }
        let min_height = a.rect.height.min(b.rect.height);
        if min_height <= 0.0 {
            return false;
        }
        let overlap_ratio = a.rect.vertical_overlap(&b.rect) / min_height;
        let required = 1.0 - self.rule.vertical_overlap_tolerance / 100.0;
        overlap_ratio >= required
            && (a.rect.height - b.rect.height).abs() <= self.rule.height_similarity
    }

    fn glues_vertically(&self, a: &Piece, b: &Piece) -> bool {
        let line_height = a.rect.height.max(b.rect.height);
        if a.rect.vertical_gap(&b.rect) > self.rule.vertical_glue * line_height {
            return false;
        }
        let min_width = a.rect.width.min(b.rect.width);
        if min_width <= 0.0 {
            return false;
        }
        a.rect.horizontal_overlap(&b.rect) / min_width > self.rule.min_horizontal_overlap
    }

    /// Whether two fragments glue directly (without transitivity)
    pub fn glues(&self, a: &TextFragment, b: &TextFragment) -> bool {
        let (pa, pb) = (Piece::new(a.rect, &a.text), Piece::new(b.rect, &b.text));
        self.glues_horizontally(&pa, &pb) || self.glues_vertically(&pa, &pb)
    }

    fn passes_region_minimums(&self, fragment: &TextFragment) -> bool {
        !fragment.rect.is_degenerate()
            && fragment.rect.width >= self.rule.min_region_width
            && fragment.rect.height >= self.rule.min_region_height
            && !fragment.text.trim().is_empty()
    }

    /// Glue one cycle's filtered fragments into blocks.
    ///
    /// Fails without gluing when the fragment count exceeds the configured
    /// per-cycle bound.
    pub fn glue(&self, fragments: &[TextFragment]) -> Result<Vec<GluedBlock>, GlueError> {
        if fragments.len() > self.max_fragments {
            warn!(
                "Skipping glue: {} fragments exceed the per-cycle limit of {}",
                fragments.len(),
                self.max_fragments
            );
            return Err(GlueError::TooManyFragments {
                count: fragments.len(),
                limit: self.max_fragments,
            });
        }

        let candidates: Vec<TextFragment> = fragments
            .iter()
            .filter(|f| self.passes_region_minimums(f))
            .cloned()
            .collect();
        if candidates.len() < fragments.len() {
            debug!(
                "Discarded {} degenerate or undersized fragments",
                fragments.len() - candidates.len()
            );
        }

        // Each group holds indices into `candidates`
        let mut groups: Vec<Vec<usize>> = (0..candidates.len()).map(|i| vec![i]).collect();
        loop {
            let pieces: Vec<Piece> = groups
                .iter()
                .map(|g| {
                    let (rect, text) = self.render(&candidates, g);
                    Piece::new(rect, &text)
                })
                .collect();

            let mut uf = UnionFind::new(pieces.len());
            for i in 0..pieces.len() {
                for j in (i + 1)..pieces.len() {
                    if self.glues_horizontally(&pieces[i], &pieces[j])
                        || self.glues_vertically(&pieces[i], &pieces[j])
                    {
                        uf.union(i, j);
                    }
                }
            }

            let mut merged: Vec<Vec<usize>> = Vec::new();
            let mut root_slot: Vec<Option<usize>> = vec![None; pieces.len()];
            for (i, group) in groups.iter().enumerate() {
                let root = uf.find(i);
                match root_slot[root] {
                    Some(slot) => merged[slot].extend(group.iter().copied()),
                    None => {
                        root_slot[root] = Some(merged.len());
                        merged.push(group.clone());
                    }
                }
            }

            let done = merged.len() == groups.len();
            groups = merged;
            if done {
                break;
            }
        }

        let mut blocks: Vec<GluedBlock> = groups
            .iter()
            .map(|g| {
                let ordered = self.reading_order(&candidates, g);
                let (rect, text) = self.render(&candidates, g);
                GluedBlock {
                    index: 0,
                    rect,
                    text,
                    fragments: ordered.into_iter().map(|i| candidates[i].clone()).collect(),
                }
            })
            .filter(|b| {
                let keep = b.char_count() >= self.rule.min_text_fragment_size;
                if !keep {
                    debug!("Dropping noise block '{}'", b.text);
                }
                keep
            })
            .collect();

        blocks.sort_by(|a, b| {
            a.rect
                .y
                .total_cmp(&b.rect.y)
                .then(a.rect.x.total_cmp(&b.rect.x))
        });
        for (i, block) in blocks.iter_mut().enumerate() {
            block.index = i;
        }
        Ok(blocks)
    }

    /// Group members sorted into rows top-to-bottom, each row left-to-right
    fn rows(&self, fragments: &[TextFragment], members: &[usize]) -> Vec<Vec<usize>> {
        let mut sorted: Vec<usize> = members.to_vec();
        sorted.sort_by(|&a, &b| {
            let (ra, rb) = (&fragments[a].rect, &fragments[b].rect);
            ra.y.total_cmp(&rb.y).then(ra.x.total_cmp(&rb.x)).then(a.cmp(&b))
        });

        let mut rows: Vec<(Rect, Vec<usize>)> = Vec::new();
        for i in sorted {
            let rect = fragments[i].rect;
            let same_row = rows.last().is_some_and(|(band, _)| {
                let min_height = band.height.min(rect.height);
                min_height > 0.0 && band.vertical_overlap(&rect) >= 0.5 * min_height
            });
            match rows.last_mut() {
                Some((band, row)) if same_row => {
                    *band = band.union(&rect);
                    row.push(i);
                }
                _ => rows.push((rect, vec![i])),
            }
        }

        rows.into_iter()
            .map(|(_, mut row)| {
                row.sort_by(|&a, &b| {
                    fragments[a].rect.x.total_cmp(&fragments[b].rect.x).then(a.cmp(&b))
                });
                row
            })
            .collect()
    }

    fn reading_order(&self, fragments: &[TextFragment], members: &[usize]) -> Vec<usize> {
        self.rows(fragments, members).into_iter().flatten().collect()
    }

    /// Union rectangle and reading-order text of a group
    fn render(&self, fragments: &[TextFragment], members: &[usize]) -> (Rect, String) {
        let mut rect: Option<Rect> = None;
        for &i in members {
            rect = Some(match rect {
                Some(r) => r.union(&fragments[i].rect),
                None => fragments[i].rect,
            });
        }

        let mut text = String::new();
        for (row_index, row) in self.rows(fragments, members).iter().enumerate() {
            if row_index > 0 {
                let next = row.first().map(|&i| fragments[i].text.trim()).unwrap_or("");
                if self.rule.keep_linefeeds {
                    text.push('\n');
                } else {
                    push_separator(&mut text, next);
                }
            }
            for (k, &i) in row.iter().enumerate() {
                let piece = fragments[i].text.trim();
                if k > 0 {
                    push_separator(&mut text, piece);
                }
                text.push_str(piece);
            }
        }

        (rect.unwrap_or_default(), text)
    }
}

/// CJK scripts are written without spaces between words
fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF      // hiragana, katakana
        | 0x3400..=0x4DBF    // CJK extension A
        | 0x4E00..=0x9FFF    // CJK unified ideographs
        | 0xAC00..=0xD7AF    // hangul syllables
        | 0xF900..=0xFAFF    // CJK compatibility ideographs
        | 0xFF00..=0xFFEF    // half/full-width forms
        | 0x3000..=0x303F)   // CJK punctuation
}

fn push_separator(text: &mut String, next: &str) {
    let prev = text.chars().last();
    let next = next.chars().next();
    match (prev, next) {
        (Some(p), Some(n)) if is_cjk(p) && is_cjk(n) => {}
        (Some(_), _) => text.push(' '),
        (None, _) => {}
    }
}
