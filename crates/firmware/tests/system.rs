//! End-to-end checks of the firmware task wiring

use firmware::sim::{run_simulation, SimDma, SimProbe, SimThermocouple};
use firmware::{BulkDrainTask, FirmwareConfig, FrameCheckTask, FrameLog, SensorTask, BULK_RING_LEN};
use max6675::{Max6675, ReadingCell, ThermocoupleMonitor};
use mcu_hal::TickCounter;
use ring_buffer::RingBuffer;
use task_scheduler::SchedulerBuilder;
use uart_rx::{BulkDrain, BulkIngest, FrameReceiver, BULK_CAPTURE_LEN, SMALL_CAPTURE_LEN};

#[test]
fn test_tick_driven_wiring() {
    let clock = TickCounter::new();
    let mut driver = clock.take_driver().unwrap();
    let probe = SimProbe::new(100);
    let reading = ReadingCell::new();

    let mut receiver = FrameReceiver::<SMALL_CAPTURE_LEN>::new(&clock, 10);
    let (mut writer, finalizer) = receiver.split();
    let mut ring = RingBuffer::<BULK_RING_LEN>::new();
    let (producer, consumer) = ring.split();
    let mut ingest =
        BulkIngest::<_, BULK_CAPTURE_LEN, BULK_RING_LEN>::new(producer, SimDma::default());
    ingest.start().unwrap();

    let mut frame_task = FrameCheckTask::new(finalizer, FrameLog::new("uart"));
    let mut bulk_task = BulkDrainTask::new(BulkDrain::new(consumer), FrameLog::new("dma"));
    let mut sensor_task = SensorTask::new(ThermocoupleMonitor::new(
        Max6675::new(SimThermocouple::new(&probe)),
        &reading,
    ));

    let mut builder = SchedulerBuilder::<4>::new(&clock);
    builder.register("frame-check", 1, &mut frame_task).unwrap();
    builder.register("bulk-drain", 5, &mut bulk_task).unwrap();
    builder.register("thermocouple", 250, &mut sensor_task).unwrap();
    let mut scheduler = builder.build();

    let mut saw_fault_with_stale_value = false;
    for tick in 1..=1000u32 {
        driver.advance();

        // Three-byte command every 100 ticks, one byte per tick
        if tick % 100 < 3 && tick >= 100 {
            writer.on_byte(b"AT\n"[(tick % 100) as usize]);
        }
        // One DMA block every 300 ticks
        if tick % 300 == 0 {
            let block = b"$LOG,1,2,3\r\n";
            ingest.stage_mut()[..block.len()].copy_from_slice(block);
            assert_eq!(ingest.on_block(block.len()).unwrap(), block.len());
        }
        // Probe unplugged between ticks 400 and 700
        probe.set_connected(!(400..700).contains(&tick));

        scheduler.run_pass();

        if tick == 600 {
            let r = reading.load();
            assert!(r.fault);
            assert!(r.valid);
            assert_eq!(r.temperature.quarter_degrees(), 100);
            saw_fault_with_stale_value = true;
        }
    }

    let tasks = scheduler.summary();
    drop(scheduler);

    assert!(saw_fault_with_stale_value);
    assert_eq!(tasks[0].0, "frame-check");
    assert_eq!(tasks[2].1.runs, 4);

    // Commands start at 100, 200, ..., 900 and 1000; the last one has not
    // timed out yet
    assert_eq!(frame_task.stats().delivered, 9);
    assert_eq!(frame_task.stats().discarded, 0);
    assert_eq!(frame_task.consumer().bytes(), 27);

    assert_eq!(bulk_task.totals(), (36, 0));

    let sensor = sensor_task.stats();
    assert_eq!(sensor.samples, 4);
    assert_eq!(sensor.faults, 1);
    assert!(!reading.load().fault);
}

#[test]
fn test_threaded_simulation_smoke() {
    let mut config = FirmwareConfig::default();
    config.sensor_period_ticks = 200;
    config.sim.tick_interval_us = 200;
    config.sim.run_ticks = 1300;
    config.sim.frame_interval_ticks = 100;
    config.sim.bulk_interval_ticks = 150;
    config.sim.open_circuit_at_tick = Some(300);
    config.sim.reconnect_at_tick = Some(900);

    let report = run_simulation(&config).unwrap();

    assert!(report.frames.delivered >= 1);
    assert_eq!(report.frames.discarded, 0);
    assert_eq!(report.frames_seen, report.frames.delivered);
    assert!(report.bulk_drained > 0);
    assert_eq!(report.bulk_dropped, 0);
    assert_eq!(report.dma_rearm_failures, 0);

    assert!(report.sensor.samples >= 3);
    assert!(report.sensor.faults >= 1);
    assert!(report.reading.valid);
    assert!(!report.reading.fault);
    assert_eq!(report.tasks.len(), 4);
}
