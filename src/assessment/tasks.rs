//! Fixed script of assessment steps.
//!
//! Step 1 is the sample download, steps 2-5 are the four exercises and
//! step 6 is the final save-and-upload.

use serde::Serialize;

pub const TOTAL_STEPS: u32 = 6;
pub const SAMPLE_FILE_NAME: &str = "dummy_excel_assessment_data.xlsx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskDefinition {
    pub number: u32,
    pub title: &'static str,
    pub question: &'static str,
    pub task: &'static str,
    pub expected_response: &'static str,
}

static TASKS: [TaskDefinition; TOTAL_STEPS as usize] = [
    TaskDefinition {
        number: 1,
        title: "Download Sample Data",
        question: "Before we start, download the file 'dummy_excel_assessment_data.xlsx' from the assessment directory. It holds the sales data you will use for every task. Let me know once you have downloaded and opened it.",
        task: "Download and open the sample Excel file",
        expected_response: "Confirmation that the file is downloaded and opened",
    },
    TaskDefinition {
        number: 2,
        title: "Exercise 1: Basic Pivot Table",
        question: "Build a pivot table showing total revenue by region: put 'Region' in Rows and 'Revenue' in Values. Which regions appear, and which one has the highest revenue?",
        task: "Create a basic pivot table showing revenue by region",
        expected_response: "List of regions and the highest-revenue region",
    },
    TaskDefinition {
        number: 3,
        title: "Exercise 2: Chart Creation",
        question: "Add a bar chart based on your pivot table to visualise revenue by region. Which chart type did you pick, and what does the chart tell you about the data?",
        task: "Add a bar chart that visualises the pivot table",
        expected_response: "Chart type and insights drawn from it",
    },
    TaskDefinition {
        number: 4,
        title: "Exercise 3: Advanced Analysis",
        question: "Create a second pivot table that breaks sales down by both 'Product Category' and 'Region'. What is the top-selling category overall, and which region and category pair earns the most revenue?",
        task: "Create a pivot table by Product Category and Region",
        expected_response: "Top category and best region-category combination",
    },
    TaskDefinition {
        number: 5,
        title: "Exercise 4: Calculated Fields",
        question: "Add a 'Profit Margin' column computed as Revenue - Cost, then apply conditional formatting: green above $1000, red below $500. What average profit margin did you get?",
        task: "Add a calculated column with conditional formatting",
        expected_response: "Average profit margin and confirmation of the formatting",
    },
    TaskDefinition {
        number: 6,
        title: "Final Task: Save and Upload",
        question: "Save your workbook with every pivot table, chart and calculated field tidy and readable, then upload the completed file. Type 'upload' when you are ready to submit it for evaluation.",
        task: "Save the work and upload the completed file",
        expected_response: "Upload of the completed workbook",
    },
];

/// Looks up a step by number; anything outside 1..=6 falls back to step 1.
pub fn lookup(number: i64) -> &'static TaskDefinition {
    usize::try_from(number)
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| TASKS.get(index))
        .unwrap_or(&TASKS[0])
}

/// Short labels for progress displays, in step order.
pub fn step_titles() -> Vec<&'static str> {
    TASKS.iter().map(|task| task.title).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadHelp {
    pub help_type: &'static str,
    pub sample_file_name: &'static str,
    pub location: &'static str,
    pub contents: &'static str,
    pub steps: Vec<&'static str>,
}

pub fn download_help() -> DownloadHelp {
    DownloadHelp {
        help_type: "download_assistance",
        sample_file_name: SAMPLE_FILE_NAME,
        location: "The assessment directory, next to this tool",
        contents: "Sales data with Date, Region, Product, Revenue, Cost and Salesperson columns",
        steps: vec![
            "Download the sample file",
            "Open it in Microsoft Excel",
            "Complete the four exercises",
            "Save your work",
            "Upload the completed file",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_step_is_reachable_by_its_number() {
        for number in 1..=TOTAL_STEPS {
            let task = lookup(number.into());
            assert_eq!(task.number, number);
            assert!(!task.title.is_empty());
            assert!(!task.question.is_empty());
        }
    }

    #[test]
    fn out_of_range_numbers_fall_back_to_the_first_step() {
        assert_eq!(lookup(0).number, 1);
        assert_eq!(lookup(7).number, 1);
        assert_eq!(lookup(-1).number, 1);
        assert_eq!(lookup(i64::MIN).number, 1);
        assert_eq!(lookup(i64::MAX).number, 1);
    }

    #[test]
    fn table_is_ordered_and_complete() {
        let numbers: Vec<u32> = TASKS.iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(step_titles().len(), TOTAL_STEPS as usize);
    }

    #[test]
    fn download_help_names_the_sample_file() {
        let help = download_help();
        assert_eq!(help.sample_file_name, SAMPLE_FILE_NAME);
        assert_eq!(help.steps.len(), 5);
    }
}
