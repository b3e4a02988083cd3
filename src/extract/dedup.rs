//! Overlap-based table deduplication.

use crate::model::TableCandidate;

/// Drop tables that overlap a better-scoring table on the same page.
///
/// Two candidates are duplicates when both have a bounding box and their IoU
/// exceeds `iou_threshold`. The higher score survives; on a tie the earlier
/// candidate does. Candidates without a box are always kept. Survivors keep
/// their input order. Returns the survivors and the number removed.
pub fn deduplicate(
    candidates: Vec<TableCandidate>,
    iou_threshold: f32,
) -> (Vec<TableCandidate>, usize) {
    let n = candidates.len();
    let mut removed = vec![false; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if removed[i] {
                break;
            }
            if removed[j] || candidates[i].page != candidates[j].page {
                continue;
            }
            let (Some(a), Some(b)) = (candidates[i].bbox, candidates[j].bbox) else {
                continue;
            };

            let iou = a.iou(&b);
            if iou <= iou_threshold {
                continue;
            }

            let loser = if candidates[j].score() > candidates[i].score() {
                i
            } else {
                j
            };
            log::debug!(
                "Table {} on page {} duplicates another (IoU {:.2}), dropped",
                candidates[loser].index,
                candidates[loser].page,
                iou
            );
            removed[loser] = true;
        }
    }

    let removed_count = removed.iter().filter(|r| **r).count();
    let kept = candidates
        .into_iter()
        .zip(removed)
        .filter(|(_, r)| !r)
        .map(|(c, _)| c)
        .collect();

    (kept, removed_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::model::TableGrid;
    use image::DynamicImage;

    fn candidate(index: usize, rows: usize, cols: usize, bbox: Option<[f32; 4]>) -> TableCandidate {
        let row: Vec<String> = (0..cols).map(|c| format!("c{}", c)).collect();
        TableCandidate {
            page: 1,
            index,
            grid: TableGrid::new(vec![row; rows]),
            bbox: bbox.and_then(|[x0, y0, x1, y1]| BoundingBox::new(x0, y0, x1, y1)),
            raster: DynamicImage::new_rgb8(1, 1),
        }
    }

    #[test]
    fn test_keeps_higher_score() {
        // IoU 0.95: 100x100 vs 100x95 inside it
        let small = candidate(0, 3, 2, Some([0.0, 0.0, 100.0, 95.0]));
        let large = candidate(1, 4, 3, Some([0.0, 0.0, 100.0, 100.0]));
        assert!((small.bbox.unwrap().iou(&large.bbox.unwrap()) - 0.95).abs() < 1e-6);

        let (kept, removed) = deduplicate(vec![small, large], 0.8);
        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].rows() * kept[0].columns(), 12);
    }

    #[test]
    fn test_preserves_non_overlapping() {
        let tables = vec![
            candidate(0, 2, 2, Some([0.0, 0.0, 100.0, 100.0])),
            candidate(1, 2, 2, Some([50.0, 0.0, 150.0, 100.0])),
            candidate(2, 2, 2, Some([0.0, 300.0, 100.0, 400.0])),
        ];
        let (kept, removed) = deduplicate(tables, 0.8);
        assert_eq!(removed, 0);
        assert_eq!(kept.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_iou_at_threshold_is_not_duplicate() {
        // 100x80 inside 100x100: 8000 / 10000
        let outer = candidate(0, 2, 2, Some([0.0, 0.0, 100.0, 100.0]));
        let inner = candidate(1, 4, 4, Some([0.0, 0.0, 100.0, 80.0]));
        assert_eq!(outer.bbox.unwrap().iou(&inner.bbox.unwrap()), 0.8);

        let (kept, removed) = deduplicate(vec![outer, inner], 0.8);
        assert_eq!(removed, 0);
        assert_eq!(kept.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_tie_keeps_earlier() {
        let first = candidate(0, 2, 2, Some([0.0, 0.0, 100.0, 100.0]));
        let second = candidate(1, 2, 2, Some([0.0, 0.0, 100.0, 100.0]));
        let (kept, removed) = deduplicate(vec![first, second], 0.8);
        assert_eq!(removed, 1);
        assert_eq!(kept[0].index, 0);
    }

    #[test]
    fn test_without_bbox_never_merged() {
        let tables = vec![
            candidate(0, 2, 2, None),
            candidate(1, 2, 2, None),
            candidate(2, 2, 2, Some([0.0, 0.0, 10.0, 10.0])),
        ];
        let (kept, removed) = deduplicate(tables, 0.8);
        assert_eq!(removed, 0);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_other_pages_never_merged() {
        let first = candidate(0, 2, 2, Some([0.0, 0.0, 100.0, 100.0]));
        let mut second = candidate(0, 2, 2, Some([0.0, 0.0, 100.0, 100.0]));
        second.page = 2;
        let (kept, removed) = deduplicate(vec![first, second], 0.8);
        assert_eq!(removed, 0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_first_absorbs_several() {
        // Both later tables overlap the first and score lower.
        let tables = vec![
            candidate(0, 4, 4, Some([0.0, 0.0, 100.0, 100.0])),
            candidate(1, 2, 2, Some([0.0, 0.0, 100.0, 98.0])),
            candidate(2, 4, 4, Some([0.0, 0.0, 100.0, 99.0])),
        ];
        let (kept, removed) = deduplicate(tables, 0.8);
        assert_eq!(removed, 2);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 0);
    }
}
