//! services/api/src/reports/html.rs
//!
//! Self-contained HTML documents for the report templates. The markup is print-ready;
//! turning it into a PDF is left to an external renderer.

use super::{AgentReport, DashboardReport, ExportPayload, TrendsReport};
use agent_metrics_core::aggregate::{AgentMetrics, AggregatedMetrics};
use agent_metrics_core::change::{Change, Trend};
use agent_metrics_core::domain::AgentClass;
use agent_metrics_core::rank::RankedAgent;
use agent_metrics_core::window::{format_date, DateRange};
use std::fmt::{self, Write};

const STYLES: &str = "body{font-family:Arial,sans-serif;color:#333;margin:24px}\
h1{color:#1f4e79;border-bottom:2px solid #1f4e79;padding-bottom:8px}\
h2{color:#2e75b6;margin-top:28px}\
table{border-collapse:collapse;width:100%;margin-top:8px}\
th,td{border:1px solid #ccc;padding:6px 8px;text-align:left}\
th{background:#f2f6fa}\
.up{color:#2e7d32}.down{color:#c62828}.neutral{color:#757575}\
.meta{color:#757575;font-size:12px}";

/// Escapes text for inclusion in HTML element content or attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn period_label(period: &DateRange) -> String {
    match (period.from, period.to) {
        (Some(from), Some(to)) => format!("{} - {}", format_date(from), format_date(to)),
        (Some(from), None) => format!("Desde {}", format_date(from)),
        (None, Some(to)) => format!("Hasta {}", format_date(to)),
        (None, None) => "Todos los registros".to_string(),
    }
}

fn trend_cell(change: &Change) -> String {
    let (class, arrow) = match change.trend {
        Trend::Up => ("up", "&#9650;"),
        Trend::Down => ("down", "&#9660;"),
        Trend::Neutral => ("neutral", "&#9654;"),
    };
    format!(
        "<span class=\"{}\">{} {}%</span>",
        class,
        arrow,
        change.signed_percentage()
    )
}

// Writing into a `String` cannot fail, so the `fmt::Result` is dropped here only.
fn document<F>(title: &str, body: F) -> String
where
    F: FnOnce(&mut String) -> fmt::Result,
{
    let mut out = String::new();
    let _ = write_document(&mut out, title, body);
    out
}

fn write_document<F>(out: &mut String, title: &str, body: F) -> fmt::Result
where
    F: FnOnce(&mut String) -> fmt::Result,
{
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"es\"><head><meta charset=\"utf-8\">")?;
    writeln!(out, "<title>{}</title>", escape(title))?;
    writeln!(out, "<style>{}</style></head><body>", STYLES)?;
    writeln!(out, "<h1>{}</h1>", escape(title))?;
    body(out)?;
    writeln!(out, "</body></html>")
}

fn metrics_table(out: &mut String, m: &AggregatedMetrics) -> fmt::Result {
    writeln!(out, "<table><tr><th>Métrica</th><th>Total</th><th>Promedio por registro</th></tr>")?;
    let rows = [
        ("Consultas recibidas", m.totals.inquiries, m.averages.inquiries),
        ("Muestras realizadas", m.totals.showings, m.averages.showings),
        ("Operaciones cerradas", m.totals.deals, m.averages.deals),
        ("Captaciones", m.totals.listings, m.averages.listings),
        ("Propiedades en CRM", m.totals.crm_properties, m.averages.crm_properties),
    ];
    for (label, total, average) in rows {
        writeln!(out, "<tr><td>{}</td><td>{}</td><td>{}</td></tr>", label, total, average)?;
    }
    writeln!(out, "</table>")
}

fn rates_table(out: &mut String, m: &AggregatedMetrics) -> fmt::Result {
    let r = &m.conversion_rates;
    writeln!(out, "<table><tr><th>Tasa</th><th>Valor</th></tr>")?;
    let rows = [
        ("Consultas &rarr; Muestras", r.inquiries_to_showings),
        ("Muestras &rarr; Operaciones", r.showings_to_deals),
        ("Consultas &rarr; Operaciones", r.inquiries_to_deals),
        ("Consultas &rarr; Captaciones", r.inquiries_to_listings),
        ("Seguimiento", m.follow_up_rate),
        ("Dificultad con CRM", m.crm_difficulty_rate),
    ];
    for (label, value) in rows {
        writeln!(out, "<tr><td>{}</td><td>{}%</td></tr>", label, value)?;
    }
    writeln!(out, "</table>")
}

fn class_label(class: AgentClass) -> &'static str {
    match class {
        AgentClass::Standard => "Estándar",
        AgentClass::NoShowings => "Sin muestras",
    }
}

fn leaderboard(out: &mut String, title: &str, rows: &[RankedAgent]) -> fmt::Result {
    writeln!(out, "<h3>{}</h3>", escape(title))?;
    if rows.is_empty() {
        return writeln!(out, "<p>Sin datos.</p>");
    }
    writeln!(out, "<table><tr><th>#</th><th>Agente</th><th>Valor</th></tr>")?;
    for row in rows {
        writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            row.position,
            escape(&row.entry.agent.name),
            row.value
        )?;
    }
    writeln!(out, "</table>")
}

fn agents_table(out: &mut String, agents: &[AgentMetrics]) -> fmt::Result {
    writeln!(
        out,
        "<table><tr><th>Agente</th><th>Tipo</th><th>Registros</th><th>Consultas</th>\
         <th>Muestras</th><th>Operaciones</th><th>Captaciones</th><th>Puntaje</th>\
         <th>Puntaje con captaciones</th></tr>"
    )?;
    for entry in agents {
        let t = &entry.metrics.totals;
        writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&entry.agent.name),
            class_label(entry.class),
            t.records,
            t.inquiries,
            t.showings,
            t.deals,
            t.listings,
            entry.score,
            entry.score_with_listings
        )?;
    }
    writeln!(out, "</table>")
}

//=========================================================================================
// Templates
//=========================================================================================

pub fn render_dashboard(report: &DashboardReport) -> String {
    document("Reporte de desempeño del equipo", |out| {
        writeln!(
            out,
            "<p class=\"meta\">Período: {} &middot; Generado: {}</p>",
            escape(&period_label(&report.period)),
            report.generated_at.format("%Y-%m-%d %H:%M UTC")
        )?;
        writeln!(out, "<h2>Métricas generales ({} agentes)</h2>", report.team.agent_count)?;
        metrics_table(out, &report.team.metrics)?;
        writeln!(out, "<h2>Tasas de conversión del equipo</h2>")?;
        rates_table(out, &report.team.metrics)?;

        let boards = &report.leaderboards;
        writeln!(out, "<h2>Rankings</h2>")?;
        leaderboard(out, "Captaciones", &boards.listings)?;
        leaderboard(out, "Muestras", &boards.showings)?;
        leaderboard(out, "Operaciones", &boards.deals)?;
        leaderboard(out, "Conversión consultas a muestras (%)", &boards.inquiries_to_showings)?;
        leaderboard(out, "Conversión muestras a operaciones (%)", &boards.showings_to_deals)?;
        leaderboard(out, "Puntaje general", &boards.score)?;

        writeln!(out, "<h2>Detalle por agente</h2>")?;
        agents_table(out, &report.agents)
    })
}

pub fn render_agent(report: &AgentReport) -> String {
    let entry = &report.agent;
    document("Análisis de desempeño individual", |out| {
        writeln!(
            out,
            "<h2>{} <small>({})</small></h2>",
            escape(&entry.agent.name),
            escape(&entry.agent.email)
        )?;
        writeln!(
            out,
            "<p class=\"meta\">Período: {} &middot; Tipo: {}</p>",
            escape(&period_label(&report.period)),
            class_label(entry.class)
        )?;
        writeln!(out, "<h2>Métricas principales</h2>")?;
        metrics_table(out, &entry.metrics)?;
        writeln!(out, "<h2>Tasas</h2>")?;
        rates_table(out, &entry.metrics)?;

        writeln!(out, "<h2>Posición en el equipo</h2>")?;
        match report.position {
            Some(position) => writeln!(
                out,
                "<p>Puesto {} de {} por puntaje ({} puntos).</p>",
                position, report.total_agents, entry.score
            )?,
            None => writeln!(out, "<p>Sin posición en el período.</p>")?,
        }

        if let Some(weekly) = &report.weekly {
            writeln!(out, "<h2>Análisis semanal</h2>")?;
            writeln!(
                out,
                "<p class=\"meta\">Semana actual: {} - {} &middot; Semana anterior: {} - {}</p>",
                format_date(weekly.current_window.start_date()),
                format_date(weekly.current_window.end_date()),
                format_date(weekly.previous_window.start_date()),
                format_date(weekly.previous_window.end_date())
            )?;
            writeln!(out, "<table><tr><th>Métrica</th><th>Actual</th><th>Anterior</th><th>Cambio</th></tr>")?;
            let (c, p, ch) = (&weekly.current.totals, &weekly.previous.totals, &weekly.changes);
            let rows = [
                ("Registros", c.records, p.records, &ch.records),
                ("Consultas", c.inquiries, p.inquiries, &ch.inquiries),
                ("Muestras", c.showings, p.showings, &ch.showings),
                ("Operaciones", c.deals, p.deals, &ch.deals),
                ("Captaciones", c.listings, p.listings, &ch.listings),
            ];
            for (label, current, previous, change) in rows {
                writeln!(
                    out,
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    label,
                    current,
                    previous,
                    trend_cell(change)
                )?;
            }
            writeln!(out, "</table>")?;
        }

        writeln!(out, "<h2>Registros recientes</h2>")?;
        writeln!(out, "<table><tr><th>Fecha</th><th>Consultas</th><th>Muestras</th><th>Operaciones</th><th>Captaciones</th><th>Notas</th></tr>")?;
        for record in &report.recent_records {
            writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                format_date(record.date),
                record.inquiries_received,
                record.showings_completed.map_or("-".to_string(), |v| v.to_string()),
                record.deals_closed.map_or("-".to_string(), |v| v.to_string()),
                record.listings_acquired,
                escape(record.notes.as_deref().unwrap_or(""))
            )?;
        }
        writeln!(out, "</table>")
    })
}

pub fn render_trends(report: &TrendsReport) -> String {
    document("Análisis de tendencias", |out| {
        writeln!(
            out,
            "<p class=\"meta\">{} semanas hasta {}</p>",
            report.weeks.len(),
            format_date(report.end_date)
        )?;
        writeln!(out, "<h2>Tendencias generales</h2>")?;
        writeln!(out, "<table><tr><th>Métrica</th><th>Tendencia</th></tr>")?;
        let t = &report.trends;
        let rows = [
            ("Consultas", &t.inquiries),
            ("Muestras", &t.showings),
            ("Operaciones", &t.deals),
            ("Captaciones", &t.listings),
            ("Propiedades en CRM", &t.crm_properties),
        ];
        for (label, change) in rows {
            writeln!(out, "<tr><td>{}</td><td>{}</td></tr>", label, trend_cell(change))?;
        }
        writeln!(out, "</table>")?;

        writeln!(out, "<h2>Datos semanales</h2>")?;
        writeln!(out, "<table><tr><th>Semana</th><th>Período</th><th>Registros</th><th>Consultas</th><th>Muestras</th><th>Operaciones</th><th>Captaciones</th></tr>")?;
        for bucket in &report.weeks {
            let totals = &bucket.metrics.totals;
            writeln!(
                out,
                "<tr><td>{}/{}</td><td>{} - {}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                bucket.week_number,
                bucket.year,
                bucket.start_formatted,
                bucket.end_formatted,
                totals.records,
                totals.inquiries,
                totals.showings,
                totals.deals,
                totals.listings
            )?;
        }
        writeln!(out, "</table>")?;

        leaderboard(out, "Mejores de la última semana", &report.top_performers)
    })
}

pub fn render_summary(payload: &ExportPayload) -> String {
    document("Resumen ejecutivo", |out| {
        let meta = &payload.metadata;
        writeln!(
            out,
            "<p class=\"meta\">Período: {} &middot; {} registros &middot; {} agentes</p>",
            escape(&period_label(&meta.period)),
            meta.total_records,
            meta.total_agents
        )?;
        writeln!(out, "<h2>Métricas clave</h2>")?;
        rates_table(out, &payload.summary.metrics)?;
        writeln!(out, "<h2>Resumen de actividad</h2>")?;
        metrics_table(out, &payload.summary.metrics)?;
        writeln!(out, "<h2>Agentes por puntaje</h2>")?;
        agents_table(out, &payload.agents)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_metrics_core::aggregate::{MetricSums, TeamMetrics};
    use agent_metrics_core::domain::AgentSummary;
    use agent_metrics_core::rank::leaderboards;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    #[test]
    fn escape_neutralises_markup() {
        assert_eq!(
            escape("<b>\"Ana\" & 'Bruno'</b>"),
            "&lt;b&gt;&quot;Ana&quot; &amp; &#39;Bruno&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn period_labels_use_long_dates() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let range = DateRange::new(Some(from), None).unwrap();
        assert_eq!(period_label(&range), "Desde 15 de enero de 2024");
        assert_eq!(period_label(&DateRange::unbounded()), "Todos los registros");
    }

    #[test]
    fn dashboard_escapes_agent_names() {
        let agents = vec![AgentMetrics::new(
            AgentSummary {
                id: Uuid::new_v4(),
                name: "<script>".to_string(),
                email: "x@example.com".to_string(),
            },
            AgentClass::Standard,
            MetricSums {
                records: 1,
                inquiries: 4,
                ..Default::default()
            },
        )];
        let report = DashboardReport {
            generated_at: Utc::now(),
            period: DateRange::unbounded(),
            team: TeamMetrics::from_agents(&agents),
            leaderboards: leaderboards(&agents, Some(5)),
            agents,
        };
        let html = render_dashboard(&report);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h1>Reporte de desempeño del equipo</h1>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.trim_end().ends_with("</html>"));
    }
}
