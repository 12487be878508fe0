// Cleaner properties on realistic layer geometry
use slcleaner::clean::{seal_edges, CleanAxes, CleanRules, ScanlineCleaner, SealedEdge};
use slcleaner::geometry::{BBox, Edge, Polygon};
use slcleaner::CleanError;
use std::time::Instant;

fn cleaner_with(bbox: BBox, rules: CleanRules, polygons: &[Polygon]) -> ScanlineCleaner {
    let mut cleaner = ScanlineCleaner::new(bbox, rules).expect("valid bbox");
    for polygon in polygons {
        cleaner.add_edges(polygon.edges()).expect("edges inside bbox");
    }
    cleaner.seal_and_sort().expect("seal");
    cleaner
}

fn row_xs(cleaner: &ScanlineCleaner, y: i32) -> Vec<i32> {
    cleaner.get_row(y).expect("row in bbox").xs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sealing_is_idempotent() {
        let polygons = [
            Polygon::rect(0, 0, 10, 10),
            Polygon::rect(10, 0, 20, 10),
            Polygon::rect(5, 5, 15, 20),
        ];
        let cleaner = cleaner_with(BBox::new(0, 20, 0, 20), CleanRules::default(), &polygons);
        let sealed = cleaner.sealed_edges().to_vec();
        assert_eq!(seal_edges(sealed.clone()), sealed);

        // Sealed edges are sorted by x, then y
        assert!(sealed.windows(2).all(|w| (w[0].x, w[0].ylo) < (w[1].x, w[1].ylo)));
    }

    #[test]
    fn test_abutting_shapes_merge_at_sealing() {
        let cleaner = cleaner_with(
            BBox::new(0, 20, 0, 10),
            CleanRules::default(),
            &[Polygon::rect(0, 0, 10, 10), Polygon::rect(10, 0, 20, 10)],
        );
        assert_eq!(
            cleaner.sealed_edges(),
            &[
                SealedEdge { x: 0, ylo: 0, yhi: 10, weight: 1 },
                SealedEdge { x: 20, ylo: 0, yhi: 10, weight: -1 },
            ]
        );
        assert_eq!(row_xs(&cleaner, 5), vec![0, 20]);
    }

    #[test]
    fn test_width_threshold() {
        let w = 5;
        // Interval of width w is removed with min_width w + 1 ...
        let mut cleaner = cleaner_with(
            BBox::new(0, 40, 0, 10),
            CleanRules::new(w + 1, 2),
            &[Polygon::rect(0, 0, 20, 10), Polygon::rect(30, 0, 30 + w, 10)],
        );
        let counts = cleaner.clean().unwrap();
        assert_eq!(counts.width, 10);
        assert_eq!(row_xs(&cleaner, 0), vec![0, 20]);

        // ... and kept with min_width w
        let mut cleaner = cleaner_with(
            BBox::new(0, 40, 0, 10),
            CleanRules::new(w, 2),
            &[Polygon::rect(0, 0, 20, 10), Polygon::rect(30, 0, 30 + w, 10)],
        );
        assert!(cleaner.clean().unwrap().is_zero());
        assert_eq!(row_xs(&cleaner, 0), vec![0, 20, 30, 30 + w]);
    }

    #[test]
    fn test_space_threshold() {
        let g = 3;
        let shapes = [Polygon::rect(0, 0, 10, 10), Polygon::rect(10 + g, 0, 20 + g, 10)];

        let mut cleaner = cleaner_with(BBox::new(0, 40, 0, 10), CleanRules::new(2, g + 1), &shapes);
        let counts = cleaner.clean().unwrap();
        assert_eq!(counts.space, 10);
        for y in 0..10 {
            assert_eq!(row_xs(&cleaner, y), vec![0, 20 + g]);
        }

        let mut cleaner = cleaner_with(BBox::new(0, 40, 0, 10), CleanRules::new(2, g), &shapes);
        assert!(cleaner.clean().unwrap().is_zero());
        assert_eq!(row_xs(&cleaner, 0), vec![0, 10, 10 + g, 20 + g]);
    }

    #[test]
    fn test_sentinel_bypasses_correction() {
        let shapes = [Polygon::rect(0, 0, 2, 10), Polygon::rect(3, 0, 20, 10)];
        for rules in [CleanRules::new(1, 50), CleanRules::new(50, 1)] {
            let mut cleaner = cleaner_with(BBox::new(0, 20, 0, 10), rules, &shapes);
            assert!(cleaner.clean().unwrap().is_zero());
            assert_eq!(row_xs(&cleaner, 4), vec![0, 2, 3, 20]);
        }

        // An explicit flag wins over the sentinel
        let rules = CleanRules::new(1, 2).with_correction(true);
        let mut cleaner = cleaner_with(BBox::new(0, 20, 0, 10), rules, &shapes);
        assert_eq!(cleaner.clean().unwrap().space, 10);
        assert_eq!(row_xs(&cleaner, 4), vec![0, 20]);
    }

    #[test]
    fn test_two_axis_cleaning_removes_vertical_sliver() {
        // 2-high horizontal bar sticking out of a block: rows keep it, columns do not
        let shapes = [Polygon::rect(0, 0, 10, 10), Polygon::rect(10, 4, 40, 6)];
        let bbox = BBox::new(0, 40, 0, 10);

        let mut rows_only = cleaner_with(bbox, CleanRules::new(3, 3), &shapes);
        rows_only.clean().unwrap();
        assert_eq!(row_xs(&rows_only, 5), vec![0, 40]);

        let mut both = cleaner_with(bbox, CleanRules::new(3, 3).with_axes(CleanAxes::Both), &shapes);
        let counts = both.clean().unwrap();
        assert!(counts.width > 0);
        assert_eq!(row_xs(&both, 5), vec![0, 10]);
        assert_eq!(both.polygons().unwrap(), vec![Polygon::rect(0, 0, 10, 10)]);
        assert!(both.stats().passes >= 2);
    }

    #[test]
    fn test_cleaned_polygons_feed_back_unchanged() {
        let shapes = [
            Polygon::rect(0, 0, 30, 5),
            Polygon::rect(0, 5, 8, 20),
            Polygon::rect(22, 5, 30, 20),
        ];
        let bbox = BBox::new(0, 30, 0, 20);
        let mut first = cleaner_with(bbox, CleanRules::new(4, 4), &shapes);
        first.clean().unwrap();
        let polygons = first.polygons().unwrap();
        assert!(polygons.iter().all(|p| p.is_clockwise() && p.is_manhattan()));

        let mut second = cleaner_with(bbox, CleanRules::new(4, 4), &polygons);
        assert!(second.clean().unwrap().is_zero());
        let before: Vec<_> = first.non_empty_rows().unwrap().collect();
        let after: Vec<_> = second.non_empty_rows().unwrap().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_edge_outside_bbox_fails() {
        let mut cleaner = ScanlineCleaner::new(BBox::new(0, 10, 0, 10), CleanRules::default()).unwrap();
        let err = cleaner.add_edge(Edge::new(0, 0, 0, 11)).unwrap_err();
        assert!(matches!(err, CleanError::EdgeOutOfBounds { .. }));
    }

    #[test]
    fn test_large_layer_timing() {
        // Grid of 2x2 squares 3 apart: every square is too narrow for min_width 4
        let mut shapes = Vec::new();
        for i in 0..200 {
            for j in 0..50 {
                shapes.push(Polygon::rect(i * 5, j * 5, i * 5 + 2, j * 5 + 2));
            }
        }
        let bbox = BBox::new(0, 1000, 0, 250);

        let start = Instant::now();
        let mut cleaner = cleaner_with(bbox, CleanRules::new(4, 2), &shapes);
        let counts = cleaner.clean().unwrap();
        println!("Cleaned {} squares in {:.3}ms", shapes.len(), start.elapsed().as_secs_f64() * 1000.0);

        assert_eq!(counts.width, 200 * 50 * 2);
        assert_eq!(cleaner.non_empty_rows().unwrap().count(), 0);
    }
}
