//! Row renderer: records in, finished cells out.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::conf::C_ROW_COLOR_KEY;
use crate::field::{CellFormatter, SpecCellRequest, derive_cell_formatter, format_cell};
use crate::spec::{
    EnumCustomMapping, SpecBooleanDisplay, SpecColumn, SpecColumnSchema, SpecFill,
    SpecFinishedCell, SpecRenderOptions, SpecRenderSettings, SpecRenderedRow,
};
use crate::util::{flatten_record, lookup_dotted_path};
use crate::value::{EnumRecordValue, Record};

/// One rendered column: schema position plus the resolved formatter.
#[derive(Debug, Clone, Copy)]
struct SpecColumnPlan {
    idx_schema: usize,
    formatter: &'static dyn CellFormatter,
}

/// Immutable per-call render context.
///
/// Built once before the first record; shared read-only by every row, so one
/// context may render rows from several threads.
#[derive(Debug)]
pub struct SpecRenderContext {
    schema: SpecColumnSchema,
    options: SpecRenderOptions,
    settings: SpecRenderSettings,
    l_plans: Vec<SpecColumnPlan>,
    l_ignore_keys: Vec<String>,
}

impl SpecRenderContext {
    /// Build the context and resolve one formatter per rendered column.
    ///
    /// Ignored columns and the reserved row-color column produce no cells.
    pub fn new(
        schema: SpecColumnSchema,
        options: SpecRenderOptions,
        settings: SpecRenderSettings,
    ) -> Self {
        let l_plans = schema
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, col)| !col.ignored && col.key != C_ROW_COLOR_KEY)
            .map(|(idx_schema, col)| SpecColumnPlan {
                idx_schema,
                formatter: derive_cell_formatter(col.kind),
            })
            .collect();
        let l_ignore_keys = schema
            .columns()
            .iter()
            .filter(|col| col.ignored)
            .map(|col| col.key.clone())
            .collect();

        Self {
            schema,
            options,
            settings,
            l_plans,
            l_ignore_keys,
        }
    }

    /// Column schema the context was built from.
    pub fn schema(&self) -> &SpecColumnSchema {
        &self.schema
    }

    /// Per-call render options.
    pub fn options(&self) -> &SpecRenderOptions {
        &self.options
    }

    /// Process-wide defaults.
    pub fn settings(&self) -> &SpecRenderSettings {
        &self.settings
    }

    /// Columns that produce cells, in output order.
    pub fn rendered_columns(&self) -> impl Iterator<Item = &SpecColumn> + '_ {
        self.l_plans
            .iter()
            .map(|plan| &self.schema.columns()[plan.idx_schema])
    }

    /// Number of cells every rendered row carries.
    pub fn width(&self) -> usize {
        self.l_plans.len()
    }

    fn custom_mapping(&self, key: &str) -> Option<&EnumCustomMapping> {
        self.schema
            .custom_formatter(key)
            .or_else(|| self.options.custom_mappings.get(key))
    }

    fn bool_display(&self) -> Option<&SpecBooleanDisplay> {
        self.options
            .boolean_display
            .as_ref()
            .or(self.settings.boolean_display.as_ref())
    }
}

/// Render one record at one-based row `row`.
///
/// Produces exactly [`SpecRenderContext::width`] cells whatever keys the
/// record actually has; a missing key becomes a `Null` cell.
pub fn render_row(record: &Record, ctx: &SpecRenderContext, row: usize) -> SpecRenderedRow {
    let dict_flat = flatten_record(record, &ctx.l_ignore_keys);
    let l_columns = ctx.schema.columns();

    let cells = ctx
        .l_plans
        .iter()
        .enumerate()
        .map(|(idx_plan, plan)| {
            let col = &l_columns[plan.idx_schema];
            let custom_mapping = ctx.custom_mapping(&col.key);
            let raw = match custom_mapping {
                Some(_) => lookup_dotted_path(record, &col.key),
                None => dict_flat.get(&col.key).cloned(),
            }
            .unwrap_or_default();

            let request = SpecCellRequest {
                key: &col.key,
                kind: col.kind,
                parse_format: col.parse_format.as_deref(),
                base_style: ctx.options.styles.body.as_ref(),
                override_style: ctx.options.styles.column_data_styles.get(&col.key),
                custom_mapping,
                configured_num_format: ctx.options.num_formats_by_key.get(&col.key).map(String::as_str),
                bool_display: ctx.bool_display(),
                list_sep: &ctx.options.list_sep,
                settings: &ctx.settings,
            };
            let out = format_cell(plan.formatter, &raw, &request);

            SpecFinishedCell {
                row,
                column: idx_plan + 1,
                key: col.key.clone(),
                value: out.value,
                num_format: out.num_format,
                style: out.style,
            }
        })
        .collect();

    SpecRenderedRow {
        row,
        cells,
        row_fill: derive_row_fill(record),
    }
}

/// Whole-row fill requested by the reserved top-level key.
fn derive_row_fill(record: &Record) -> Option<SpecFill> {
    let value = record.get(C_ROW_COLOR_KEY)?.clone().force();
    match value {
        EnumRecordValue::Null => None,
        EnumRecordValue::Text(c_color) if c_color.is_empty() => None,
        other => Some(SpecFill::solid(other.to_display_text())),
    }
}

/// Render `records` sequentially; the first record lands on `row_start`.
pub fn render_rows(records: &[Record], ctx: &SpecRenderContext, row_start: usize) -> Vec<SpecRenderedRow> {
    let l_rows: Vec<SpecRenderedRow> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| render_row(record, ctx, row_start + idx))
        .collect();
    log::debug!("rendered {} rows x {} columns", l_rows.len(), ctx.width());
    l_rows
}

/// Render `records` on a worker pool; output equals [`render_rows`].
///
/// `n_workers_max <= 1` renders serially; a pool that cannot be built falls
/// back to serial rendering.
pub fn render_rows_parallel(
    records: &[Record],
    ctx: &SpecRenderContext,
    row_start: usize,
    n_workers_max: usize,
) -> Vec<SpecRenderedRow> {
    if n_workers_max <= 1 {
        return render_rows(records, ctx, row_start);
    }

    let thread_pool = ThreadPoolBuilder::new().num_threads(n_workers_max).build();
    let Ok(thread_pool) = thread_pool else {
        log::warn!(
            "Failed to initialize thread pool (workers={n_workers_max}); fallback to serial render."
        );
        return render_rows(records, ctx, row_start);
    };

    let l_rows: Vec<SpecRenderedRow> = thread_pool.install(|| {
        records
            .par_iter()
            .enumerate()
            .map(|(idx, record)| render_row(record, ctx, row_start + idx))
            .collect()
    });
    log::debug!(
        "rendered {} rows x {} columns on {n_workers_max} workers",
        l_rows.len(),
        ctx.width()
    );
    l_rows
}
