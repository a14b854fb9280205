use crate::data::{date_to_timestamp, timestamp_to_date};
use crate::pipeline::PipelineReport;
use chrono::NaiveDate;
use eframe::egui;
use egui_plot::{Legend, Line, Plot, PlotPoints};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Lstm,
    Arima,
    History,
}

/// Plot-ready copies of the report series, x as unix seconds.
pub struct PlotData {
    pub actual: Vec<[f64; 2]>,
    pub train_overlay: Vec<[f64; 2]>,
    pub test_overlay: Vec<[f64; 2]>,
    pub rolling_actual: Vec<[f64; 2]>,
    pub rolling_forecast: Vec<[f64; 2]>,
}

fn present(dates: &[NaiveDate], values: &[Option<f64>]) -> Vec<[f64; 2]> {
    dates
        .iter()
        .zip(values)
        .filter_map(|(d, v)| v.map(|v| [date_to_timestamp(*d), v]))
        .collect()
}

impl PlotData {
    pub fn from_report(report: &PipelineReport) -> Self {
        let dates = report.series.dates();
        let actual = dates
            .iter()
            .zip(report.series.values())
            .map(|(d, v)| [date_to_timestamp(*d), *v])
            .collect();

        let rolling = &report.rolling;
        let rolling_actual = rolling
            .dates
            .iter()
            .zip(&rolling.steps)
            .map(|(d, s)| [date_to_timestamp(*d), s.actual])
            .collect();
        let rolling_forecast = rolling
            .dates
            .iter()
            .zip(&rolling.steps)
            .map(|(d, s)| [date_to_timestamp(*d), s.forecast])
            .collect();

        Self {
            actual,
            train_overlay: present(dates, &report.sequence.train_overlay),
            test_overlay: present(dates, &report.sequence.test_overlay),
            rolling_actual,
            rolling_forecast,
        }
    }
}

pub struct GuiApp {
    title: String,
    data: PlotData,
    view: View,
}

impl GuiApp {
    pub fn new(report: &PipelineReport) -> Self {
        Self {
            title: format!(
                "{} - window {}, {}",
                report.symbol, report.window, report.rolling.order
            ),
            data: PlotData::from_report(report),
            view: View::Lstm,
        }
    }
}

fn line(points: &[[f64; 2]], name: &str) -> Line {
    Line::new(PlotPoints::from(points.to_vec())).name(name)
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(self.title.as_str());
                ui.separator();
                ui.selectable_value(&mut self.view, View::Lstm, "LSTM");
                ui.selectable_value(&mut self.view, View::Arima, "ARIMA");
                ui.selectable_value(&mut self.view, View::History, "History");
            });

            let plot = Plot::new(format!("{:?}", self.view))
                .legend(Legend::default())
                .x_axis_formatter(|x, _range| {
                    timestamp_to_date(x.value)
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default()
                })
                .y_axis_label("Price");

            let data = &self.data;
            match self.view {
                View::Lstm => {
                    plot.show(ui, |plot_ui| {
                        plot_ui.line(line(&data.actual, "Actual Price"));
                        plot_ui.line(line(&data.train_overlay, "Train Predict"));
                        plot_ui.line(line(&data.test_overlay, "Test Predict"));
                    });
                }
                View::Arima => {
                    plot.show(ui, |plot_ui| {
                        plot_ui.line(line(&data.rolling_actual, "Actual Price"));
                        plot_ui.line(line(&data.rolling_forecast, "Predicted Price"));
                    });
                }
                View::History => {
                    plot.show(ui, |plot_ui| {
                        plot_ui.line(line(&data.actual, "Close"));
                    });
                }
            }
        });
    }
}

/// Opens the plot window and blocks until it is closed.
pub fn show(report: &PipelineReport) -> eframe::Result<()> {
    let options = eframe::NativeOptions::default();
    let app = GuiApp::new(report);
    eframe::run_native(
        "closecast",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
}
