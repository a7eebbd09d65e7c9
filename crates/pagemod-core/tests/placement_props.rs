//! Property tests for content placement

use pagemod_core::ContentPlacement;
use pagemod_model::{BlockPosition, SectionTemplate, GRID_WIDTH};
use pagemod_rules::{ResolvedBlock, ResolvedOutput};
use proptest::prelude::*;

const TEMPLATES: [SectionTemplate; 2] = [SectionTemplate::OneColumn, SectionTemplate::TwoColumn];

fn block(index: usize, (row, column, order, outputs): (u32, u32, u32, usize)) -> ResolvedBlock {
    ResolvedBlock {
        position: BlockPosition::new(row, column, order),
        source_type: "RichText".to_string(),
        variant: None,
        outputs: (0..outputs)
            .map(|n| ResolvedOutput::Text {
                order: n as u32 + 1,
                html: format!("<p>b{index}-{n}</p>"),
            })
            .collect(),
    }
}

/// Sections (non-empty columns of html) expected after placement
fn expected(blocks: &[ResolvedBlock]) -> Vec<Vec<Vec<String>>> {
    let mut ordered: Vec<&ResolvedBlock> = blocks.iter().collect();
    ordered.sort_by_key(|b| b.position);

    let mut grid: Vec<Vec<Vec<String>>> = Vec::new();
    for b in ordered {
        let row = b.position.row as usize - 1;
        while grid.len() <= row {
            let columns = TEMPLATES
                .get(grid.len())
                .map_or(1, |t| t.column_count());
            grid.push(vec![Vec::new(); columns]);
        }
        let last = grid[row].len() - 1;
        let column = (b.position.column as usize - 1).min(last);
        for output in &b.outputs {
            if let ResolvedOutput::Text { html, .. } = output {
                grid[row][column].push(html.clone());
            }
        }
    }

    grid.into_iter()
        .map(|columns| columns.into_iter().filter(|c| !c.is_empty()).collect::<Vec<_>>())
        .filter(|columns| !columns.is_empty())
        .collect()
}

fn arb_blocks() -> impl Strategy<Value = Vec<(u32, u32, u32, usize)>> {
    prop::collection::vec((1u32..4, 1u32..4, 0u32..5, 1usize..4), 0..12)
}

proptest! {
    #[test]
    fn prop_blocks_land_in_position_order(raw in arb_blocks()) {
        let blocks: Vec<ResolvedBlock> = raw.into_iter().enumerate().map(|(i, r)| block(i, r)).collect();
        let placement = ContentPlacement::new().place_blocks(&TEMPLATES, &blocks);

        let actual: Vec<Vec<Vec<String>>> = placement
            .sections
            .iter()
            .map(|s| {
                s.columns
                    .iter()
                    .map(|c| c.controls.iter().filter_map(|ctl| ctl.html().map(str::to_string)).collect())
                    .collect()
            })
            .collect();
        prop_assert_eq!(actual, expected(&blocks));
        prop_assert!(placement.dropped.is_empty());
    }

    #[test]
    fn prop_canvas_is_well_formed(raw in arb_blocks()) {
        let blocks: Vec<ResolvedBlock> = raw.into_iter().enumerate().map(|(i, r)| block(i, r)).collect();
        let placement = ContentPlacement::new().place_blocks(&TEMPLATES, &blocks);

        let total: usize = blocks.iter().map(|b| b.outputs.len()).sum();
        prop_assert_eq!(placement.control_count(), total);

        for (section, order) in placement.sections.iter().zip(1u32..) {
            prop_assert_eq!(section.order, order);
            prop_assert!(!section.is_empty());
            prop_assert_eq!(section.columns.len(), section.template.column_count());

            let width: u32 = section.columns.iter().map(|c| u32::from(c.factor)).sum();
            prop_assert_eq!(width, u32::from(GRID_WIDTH));

            for column in &section.columns {
                let orders: Vec<u32> = column.controls.iter().map(|c| c.order).collect();
                let numbered: Vec<u32> = (1..=orders.len() as u32).collect();
                prop_assert_eq!(orders, numbered);
            }
        }
    }
}
